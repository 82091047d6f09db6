//! Notification collaborator
//!
//! Submitters hear back when a proposal is rejected or sent back for revision,
//! and readers get a receipt for every question they file. Delivery is
//! fire-and-forget: callers spawn it and never wait.

use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    RevisionNeeded,
    Rejected,
    RequestReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient: Uuid,
    pub outcome: NotificationOutcome,
    pub policy_identity: String,
    pub notes: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), AppError>;
}

/// Writes notifications to the log instead of sending mail
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), AppError> {
        info!(
            recipient = %notification.recipient,
            outcome = ?notification.outcome,
            "Notice about {}: {}",
            notification.policy_identity,
            notification.notes.as_deref().unwrap_or("(no notes)")
        );
        Ok(())
    }
}

/// Hand the notification off without waiting on delivery
pub(crate) fn dispatch(notifier: &Arc<dyn Notifier>, enabled: bool, notification: Notification) {
    if !enabled {
        return;
    }
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        let recipient = notification.recipient;
        if let Err(e) = notifier.notify(notification).await {
            warn!("Failed to notify {}: {}", recipient, e);
        }
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// Forwards every notification into a channel the test can drain
    pub struct RecordingNotifier {
        tx: mpsc::UnboundedSender<Notification>,
    }

    impl RecordingNotifier {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Self { tx }, rx)
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: Notification) -> Result<(), AppError> {
            self.tx
                .send(notification)
                .map_err(|e| AppError::Internal(e.to_string()))
        }
    }

    /// Always fails to deliver
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: Notification) -> Result<(), AppError> {
            Err(AppError::Internal("mail relay unavailable".to_string()))
        }
    }
}
