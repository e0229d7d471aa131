//! Operator notification by mail.
//!
//! Transport is the host's business: implement [`Mailer`] over SMTP, an HTTP
//! mail API, or anything else. [`QueuedMailer`] moves delivery off the request
//! task.

use crate::error::CapabilityError;
use crate::request::RequestSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A rendered error notification, built once per reported error.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub incident_id: Uuid,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSnapshot>,
    pub occurred_at: DateTime<Utc>,
}

/// Mail-sending capability.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CapabilityError>;
}

/// Development mailer: writes notifications to the log instead of sending them.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CapabilityError> {
        tracing::info!(
            incident_id = %payload.incident_id,
            recipients = ?payload.recipients,
            "mail: {} ({} bytes)",
            payload.subject,
            payload.html_body.len()
        );
        Ok(())
    }
}

/// Queues notifications for a background task that owns the real transport.
///
/// `send` only fails when the queue is full or the worker has stopped.
/// Delivery failures are logged by the worker.
///
/// # Example
/// ```rust,no_run
/// use faultline::mail::{LogMailer, QueuedMailer};
///
/// # async fn run() {
/// let (mailer, worker) = QueuedMailer::spawn(LogMailer, 64);
/// // hand `mailer` to the filter ...
/// drop(mailer);
/// worker.await.ok(); // drains what is left in the queue
/// # }
/// ```
#[derive(Clone)]
pub struct QueuedMailer {
    sender: mpsc::Sender<NotificationPayload>,
}

impl QueuedMailer {
    pub fn spawn<M: Mailer>(transport: M, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<NotificationPayload>(capacity.max(1));
        let transport = Arc::new(transport);

        let worker = tokio::spawn(async move {
            while let Some(payload) = receiver.recv().await {
                if let Err(e) = transport.send(&payload).await {
                    tracing::error!(
                        incident_id = %payload.incident_id,
                        "Failed to deliver error notification: {}",
                        e
                    );
                }
            }
            tracing::debug!("Mail queue closed");
        });

        (Self { sender }, worker)
    }
}

#[async_trait]
impl Mailer for QueuedMailer {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), CapabilityError> {
        self.sender.try_send(payload.clone()).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "mail queue is full",
                mpsc::error::TrySendError::Closed(_) => "mail queue is closed",
            };
            reason.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Mailer for RecordingTransport {
        async fn send(&self, payload: &NotificationPayload) -> Result<(), CapabilityError> {
            self.sent.lock().await.push(payload.subject.clone());
            Ok(())
        }
    }

    fn payload(subject: &str) -> NotificationPayload {
        NotificationPayload {
            incident_id: Uuid::new_v4(),
            recipients: vec!["ops@example.com".to_string()],
            subject: subject.to_string(),
            html_body: "<p>boom</p>".to_string(),
            request: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_queued_mailer_delivers_in_order() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (mailer, worker) = QueuedMailer::spawn(
            RecordingTransport {
                sent: Arc::clone(&sent),
            },
            8,
        );

        mailer.send(&payload("first")).await.unwrap();
        mailer.send(&payload("second")).await.unwrap();
        drop(mailer);
        worker.await.unwrap();

        assert_eq!(*sent.lock().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_queued_mailer_fails_when_worker_stopped() {
        let (mailer, worker) = QueuedMailer::spawn(LogMailer, 1);
        worker.abort();
        let _ = worker.await;

        let err = mailer.send(&payload("late")).await.unwrap_err();
        assert_eq!(err.to_string(), "mail queue is closed");
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send(&payload("dev")).await.is_ok());
    }
}
