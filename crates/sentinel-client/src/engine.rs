//! Analysis engine client.
//!
//! The engine exposes three endpoints per feature: a multipart start, a
//! JSON poll, and a stop that releases server resources. [`AnalysisEngine`]
//! is the seam sessions talk through; [`HttpEngine`] is the real thing.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use sentinel_models::{Feature, PollSample};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{EngineError, EngineResult};
use crate::upload::UploadPayload;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// Operations a job session needs from the engine.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Submit a video and start the feature's job.
    async fn start_job(&self, feature: Feature, upload: &UploadPayload) -> EngineResult<()>;

    /// Fetch the latest results of the running job.
    async fn fetch_sample(&self, feature: Feature) -> EngineResult<PollSample>;

    /// Ask the engine to stop the feature's job.
    ///
    /// Stopping when nothing runs is not an error on the engine side.
    /// Sessions treat this call as best-effort and only log failures.
    async fn stop_job(&self, feature: Feature) -> EngineResult<()>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// HTTP client for the analysis engine.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: Client,
    base_url: Url,
    upload_timeout: std::time::Duration,
}

impl HttpEngine {
    /// Create a client from config.
    pub fn new(config: &ClientConfig) -> EngineResult<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            upload_timeout: config.upload_timeout,
        })
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(&ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> EngineResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Check whether the engine is up.
    pub async fn health_check(&self) -> EngineResult<bool> {
        let url = self.endpoint("/api/health")?;

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Engine health check failed: {}", e);
                return Ok(false);
            }
        };

        if !response.status().is_success() {
            return Ok(false);
        }

        let body: HealthBody = response.json().await?;
        Ok(matches!(body.status.as_str(), "healthy" | "ok"))
    }

    /// Turn a non-2xx response into an error, keeping a structured message.
    async fn error_from_response(response: reqwest::Response) -> EngineError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) if !parsed.error.trim().is_empty() => EngineError::Rejected {
                status,
                message: parsed.error,
            },
            _ => EngineError::Status { status, body },
        }
    }
}

#[async_trait]
impl AnalysisEngine for HttpEngine {
    async fn start_job(&self, feature: Feature, upload: &UploadPayload) -> EngineResult<()> {
        let url = self.endpoint(feature.start_path())?;
        let bytes = upload.read_bytes().await?;

        debug!(
            "Uploading {} ({} bytes) to {}",
            upload.file_name,
            bytes.len(),
            url
        );

        let part = Part::bytes(bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)?;
        let form = Form::new().part(VIDEO_FIELD, part);

        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }

    async fn fetch_sample(&self, feature: Feature) -> EngineResult<PollSample> {
        let url = self.endpoint(feature.data_path())?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body = response.bytes().await?;
        Ok(PollSample::from_json(feature, &body)?)
    }

    async fn stop_job(&self, feature: Feature) -> EngineResult<()> {
        let url = self.endpoint(feature.stop_path())?;
        let response = self.client.post(url).send().await?;

        if !response.status().is_success() {
            let err = Self::error_from_response(response).await;
            warn!("Engine refused stop for {}: {}", feature, err);
            return Err(err);
        }

        Ok(())
    }
}
