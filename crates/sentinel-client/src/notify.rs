//! Completion notifications.
//!
//! Notifications are a side channel: a session asks for permission once when
//! it is created and announces completed jobs only if permission was
//! granted. Delivery failures are logged by the session and never affect the
//! job.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sentinel_models::Feature;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{NotifyError, NotifyResult};

/// Whether the user allows completion notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// Not asked yet
    #[default]
    Default,
    Granted,
    Denied,
}

/// A completion announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub feature: Feature,
    pub session_id: Uuid,
}

impl Notification {
    /// Standard announcement for a finished job.
    pub fn job_complete(feature: Feature, session_id: Uuid) -> Self {
        Self {
            title: format!("{} Complete", feature.display_name()),
            body: "Your video has been processed. View the results now.".to_string(),
            feature,
            session_id,
        }
    }
}

/// Channel that surfaces completion outside the session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Current permission.
    fn permission(&self) -> NotificationPermission;

    /// Ask for permission and return the outcome.
    fn request_permission(&self) -> NotificationPermission;

    /// Deliver a notification.
    async fn notify(&self, notification: &Notification) -> NotifyResult<()>;
}

/// Sink for environments without any notification mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    async fn notify(&self, _notification: &Notification) -> NotifyResult<()> {
        Ok(())
    }
}

/// Sink that writes notifications to the log.
///
/// Permission is granted on the first request.
#[derive(Debug, Default)]
pub struct LogSink {
    permission: Mutex<NotificationPermission>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn permission(&self) -> NotificationPermission {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_permission(&self) -> NotificationPermission {
        let mut permission = self.permission.lock().unwrap_or_else(PoisonError::into_inner);
        if *permission == NotificationPermission::Default {
            *permission = NotificationPermission::Granted;
        }
        *permission
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult<()> {
        if self.permission() != NotificationPermission::Granted {
            return Err(NotifyError::PermissionDenied);
        }

        info!(
            session_id = %notification.session_id,
            feature = %notification.feature.as_str(),
            "{}: {}", notification.title, notification.body
        );
        Ok(())
    }
}

/// Sink that POSTs notifications as JSON to a webhook.
///
/// Configuring a webhook counts as granting permission.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    async fn notify(&self, notification: &Notification) -> NotifyResult<()> {
        let response = self.http.post(&self.url).json(notification).send().await?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_completion_message() {
        let n = Notification::job_complete(Feature::PeopleCount, Uuid::nil());
        assert_eq!(n.title, "People Counting Complete");
        assert_eq!(n.body, "Your video has been processed. View the results now.");
    }

    #[tokio::test]
    async fn test_log_sink_needs_permission() {
        let sink = LogSink::new();
        let n = Notification::job_complete(Feature::Mask, Uuid::new_v4());

        assert_eq!(sink.permission(), NotificationPermission::Default);
        assert!(matches!(sink.notify(&n).await, Err(NotifyError::PermissionDenied)));

        assert_eq!(sink.request_permission(), NotificationPermission::Granted);
        assert!(sink.notify(&n).await.is_ok());
    }

    #[tokio::test]
    async fn test_noop_sink_never_fails() {
        let sink = NoopSink;
        let n = Notification::job_complete(Feature::Plate, Uuid::new_v4());
        assert_eq!(sink.request_permission(), NotificationPermission::Denied);
        assert!(sink.notify(&n).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_sink_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/sentinel"))
            .and(body_partial_json(serde_json::json!({
                "title": "License Plate Detection Complete",
                "feature": "plate"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(format!("{}/hooks/sentinel", server.uri())).unwrap();
        let n = Notification::job_complete(Feature::Plate, Uuid::new_v4());
        sink.notify(&n).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_sink_reports_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri()).unwrap();
        let n = Notification::job_complete(Feature::Mask, Uuid::new_v4());
        assert!(matches!(sink.notify(&n).await, Err(NotifyError::Delivery(_))));
    }
}
