//! Upload staging and validation.
//!
//! The gate holds at most one staged file. Staging a file also mints a
//! preview reference the presentation layer can display; the reference is
//! revoked when the file is replaced, cleared, or dropped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};

/// Where the bytes of a staged file live.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// File on local disk, read when the job starts
    Path(PathBuf),
    /// In-memory buffer
    Memory(Arc<Vec<u8>>),
}

/// A file the user selected, not yet validated.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    /// Declared MIME type, `None` when it could not be determined
    pub content_type: Option<String>,
    pub size: u64,
    pub source: MediaSource,
}

impl UploadCandidate {
    /// Build a candidate from a file on disk.
    ///
    /// The content type is inferred from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        if !metadata.is_file() {
            return Err(SessionError::validation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        Ok(Self {
            content_type: content_type_for(path).map(str::to_string),
            file_name,
            size: metadata.len(),
            source: MediaSource::Path(path.to_path_buf()),
        })
    }

    /// Build a candidate from an in-memory buffer.
    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: Some(content_type.into()),
            size: bytes.len() as u64,
            source: MediaSource::Memory(Arc::new(bytes)),
        }
    }
}

/// Map a video file extension to its MIME type.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "mp4" => Some("video/mp4"),
        "m4v" => Some("video/x-m4v"),
        "avi" => Some("video/x-msvideo"),
        "mov" => Some("video/quicktime"),
        "mkv" => Some("video/x-matroska"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

/// Tracks live preview references.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: Mutex<HashSet<Uuid>>,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mint a new preview reference.
    pub fn create(self: &Arc<Self>) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);

        PreviewHandle {
            id,
            url: format!("blob:sentinel/{}", id),
            registry: Arc::clone(self),
        }
    }

    fn revoke(&self, id: &Uuid) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Number of preview references not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_live(&self, id: &Uuid) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

/// A preview reference, revoked on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    registry: Arc<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        debug!("Revoking preview {}", self.url);
        self.registry.revoke(&self.id);
    }
}

/// What the engine client needs to submit a staged file.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: String,
    pub source: MediaSource,
}

impl UploadPayload {
    /// Read the file contents.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            MediaSource::Path(path) => tokio::fs::read(path).await,
            MediaSource::Memory(bytes) => Ok(bytes.as_ref().clone()),
        }
    }
}

/// A validated file with a live preview reference.
#[derive(Debug)]
pub struct StagedFile {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub source: MediaSource,
    preview: PreviewHandle,
}

impl StagedFile {
    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn payload(&self) -> UploadPayload {
        UploadPayload {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            source: self.source.clone(),
        }
    }
}

/// Validates and stages the file a job will upload.
#[derive(Debug)]
pub struct UploadGate {
    max_bytes: u64,
    previews: Arc<PreviewRegistry>,
    staged: Option<StagedFile>,
}

impl UploadGate {
    pub fn new(max_bytes: u64) -> Self {
        Self::with_registry(max_bytes, PreviewRegistry::new())
    }

    pub fn with_registry(max_bytes: u64, previews: Arc<PreviewRegistry>) -> Self {
        Self {
            max_bytes,
            previews,
            staged: None,
        }
    }

    /// Check a candidate without staging it.
    ///
    /// Any `video/*` type is accepted; whether the engine can decode the
    /// container is its own business.
    pub fn validate(&self, candidate: &UploadCandidate) -> SessionResult<()> {
        if candidate.size == 0 {
            return Err(SessionError::validation(format!(
                "{} is empty",
                candidate.file_name
            )));
        }

        match candidate.content_type.as_deref() {
            Some(ct) if ct.trim().to_lowercase().starts_with("video/") => {}
            Some(ct) => {
                return Err(SessionError::validation(format!(
                    "{} is not a video ({})",
                    candidate.file_name, ct
                )))
            }
            None => {
                return Err(SessionError::validation(format!(
                    "{} is not a recognized video type",
                    candidate.file_name
                )))
            }
        }

        if candidate.size > self.max_bytes {
            return Err(SessionError::validation(format!(
                "{} is {} MB, the limit is {} MB",
                candidate.file_name,
                candidate.size / (1024 * 1024),
                self.max_bytes / (1024 * 1024)
            )));
        }

        Ok(())
    }

    /// Stage a selection.
    ///
    /// An empty selection is a no-op and keeps whatever is already staged.
    /// A rejected candidate also leaves the current file in place.
    pub fn select(&mut self, candidate: Option<UploadCandidate>) -> SessionResult<Option<&StagedFile>> {
        let Some(candidate) = candidate else {
            return Ok(None);
        };

        self.validate(&candidate)?;

        // Revoke the old preview before minting a new one
        self.staged = None;

        let preview = self.previews.create();
        debug!(
            "Staged {} ({} bytes) with preview {}",
            candidate.file_name,
            candidate.size,
            preview.url()
        );

        self.staged = Some(StagedFile {
            content_type: candidate.content_type.unwrap_or_default(),
            file_name: candidate.file_name,
            size: candidate.size,
            source: candidate.source,
            preview,
        });

        Ok(self.staged.as_ref())
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    /// Release the staged file and its preview.
    pub fn clear(&mut self) {
        self.staged = None;
    }

    pub fn previews(&self) -> &Arc<PreviewRegistry> {
        &self.previews
    }
}
