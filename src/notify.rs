//! Out-of-band delivery of password reset links.
//!
//! Delivery is fire-and-forget: [`dispatch_password_reset`] detaches the send
//! onto its own task and only logs failures, so the request that triggered
//! it never waits on or observes the outcome.

use crate::error::AuthError;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A reset link addressed to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetDelivery {
    pub email: String,
    pub token: String,
    pub reset_url: String,
}

/// Notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_password_reset(&self, delivery: &PasswordResetDelivery)
        -> Result<(), AuthError>;
}

/// Local dev notifier that logs the link instead of sending email.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_password_reset(
        &self,
        delivery: &PasswordResetDelivery,
    ) -> Result<(), AuthError> {
        tracing::info!(
            to_email = %delivery.email,
            reset_url = %delivery.reset_url,
            "password reset email send stub"
        );
        Ok(())
    }
}

/// Forwards deliveries into a channel, for embedding and tests
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<PasswordResetDelivery>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PasswordResetDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send_password_reset(
        &self,
        delivery: &PasswordResetDelivery,
    ) -> Result<(), AuthError> {
        self.tx
            .send(delivery.clone())
            .map_err(|_| AuthError::Notification("delivery channel closed".to_string()))
    }
}

/// Build the dashboard link for a reset token
pub fn reset_url(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/auth/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        token
    )
}

/// Send on a detached task; failures are logged and dropped
pub fn dispatch_password_reset(notifier: Arc<dyn Notifier>, delivery: PasswordResetDelivery) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send_password_reset(&delivery).await {
            tracing::error!(to_email = %delivery.email, error = %e, "Failed to deliver password reset email");
        }
    });
}
