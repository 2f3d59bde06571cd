/// Notification dispatch
///
/// Best-effort, fire-and-forget delivery of lifecycle events to users and
/// admins. The lifecycle managers hand a [`Notification`] to [`dispatch`]
/// only after the authoritative database write has committed; delivery runs
/// on a spawned task, failures are logged per-recipient, and nothing here
/// can fail a request or roll back a write.
///
/// Two implementations ship:
///
/// - [`EmailNotifier`]: posts to an EmailJS-compatible HTTP API, the same
///   delivery channel the hosted deployment uses.
/// - [`NoopNotifier`]: swallows events; used in tests and when no e-mail
///   service is configured.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// The lifecycle event a notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// A fresh registration succeeded
    WelcomeRegistration,

    /// A pre-registration was submitted (sent to the submitter)
    PreRegistrationSubmitted,

    /// A pre-registration arrived under an admin's referral (sent to the admin)
    PreRegistrationReceived,

    /// A pending user was approved and can now sign in
    AccountActivated,

    /// A task was proposed to an assignee
    TaskProposed,

    /// An assignee moved their assignment (sent to an admin)
    TaskStatusChanged,

    /// An admin approved the completed work (sent to the assignee)
    TaskCompletionApproved,
}

impl NotificationKind {
    /// Template identifier sent to the delivery service
    pub fn template_slug(&self) -> &'static str {
        match self {
            NotificationKind::WelcomeRegistration => "welcome_registration",
            NotificationKind::PreRegistrationSubmitted => "prereg_submitted_user",
            NotificationKind::PreRegistrationReceived => "prereg_notify_admin",
            NotificationKind::AccountActivated => "account_activated",
            NotificationKind::TaskProposed => "task_proposed",
            NotificationKind::TaskStatusChanged => "task_update_admin",
            NotificationKind::TaskCompletionApproved => "task_completed_user",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.template_slug())
    }
}

/// A single message to a single recipient
#[derive(Debug, Clone)]
pub struct Notification {
    /// What happened
    pub kind: NotificationKind,

    /// Recipient address
    pub to_email: String,

    /// Recipient display name
    pub to_name: String,

    /// Template data beyond the recipient fields
    pub params: JsonValue,
}

impl Notification {
    /// Creates a notification with empty template params
    pub fn new(kind: NotificationKind, to_email: impl Into<String>, to_name: impl Into<String>) -> Self {
        Self {
            kind,
            to_email: to_email.into(),
            to_name: to_name.into(),
            params: json!({}),
        }
    }

    /// Attaches template data
    pub fn with_params(mut self, params: JsonValue) -> Self {
        self.params = params;
        self
    }
}

/// Error type for notification delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure talking to the delivery service
    #[error("notification transport failed: {0}")]
    Transport(String),

    /// The delivery service rejected the message
    #[error("notification rejected by delivery service: {0}")]
    Rejected(String),
}

/// A notification delivery channel
///
/// Implementations must be cheap to share behind an `Arc` since every
/// lifecycle manager holds one.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification to one recipient
    async fn send(&self, note: &Notification) -> Result<(), NotifyError>;
}

/// Spawns best-effort delivery of a notification
///
/// Called strictly after the authoritative write commits. The spawned task
/// owns the notification; a delivery failure is logged and dropped, never
/// surfaced to the request that triggered it.
pub fn dispatch(notifier: &Arc<dyn Notifier>, note: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(err) = notifier.send(&note).await {
            warn!(
                kind = %note.kind,
                recipient = %note.to_email,
                error = %err,
                "notification delivery failed"
            );
        }
    });
}

/// Configuration for the EmailJS-compatible delivery channel
#[derive(Debug, Clone)]
pub struct EmailNotifierConfig {
    /// Delivery API endpoint
    pub api_url: String,

    /// Service identifier at the delivery provider
    pub service_id: String,

    /// Public API key
    pub public_key: String,

    /// Private API key
    pub private_key: String,
}

/// Sends notifications through an EmailJS-compatible HTTP API
pub struct EmailNotifier {
    http: reqwest::Client,
    config: EmailNotifierConfig,
}

impl EmailNotifier {
    /// Creates a notifier with a fresh HTTP client
    pub fn new(config: EmailNotifierConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, note: &Notification) -> Result<(), NotifyError> {
        let mut template_params = json!({
            "to_email": note.to_email,
            "to_name": note.to_name,
        });

        // Merge event-specific params over the recipient fields.
        if let (Some(base), Some(extra)) = (template_params.as_object_mut(), note.params.as_object())
        {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }

        let body = json!({
            "service_id": self.config.service_id,
            "template_id": note.kind.template_slug(),
            "user_id": self.config.public_key,
            "accessToken": self.config.private_key,
            "template_params": template_params,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if response.status().is_success() {
            debug!(kind = %note.kind, recipient = %note.to_email, "notification delivered");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected(format!("{status}: {text}")))
        }
    }
}

/// Notifier that drops every event
///
/// Used by the test harness and by deployments with no e-mail service
/// configured; the lifecycle code is identical either way.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, note: &Notification) -> Result<(), NotifyError> {
        debug!(kind = %note.kind, recipient = %note.to_email, "notification suppressed (noop notifier)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_slugs_are_distinct() {
        let kinds = [
            NotificationKind::WelcomeRegistration,
            NotificationKind::PreRegistrationSubmitted,
            NotificationKind::PreRegistrationReceived,
            NotificationKind::AccountActivated,
            NotificationKind::TaskProposed,
            NotificationKind::TaskStatusChanged,
            NotificationKind::TaskCompletionApproved,
        ];

        let mut slugs: Vec<&str> = kinds.iter().map(|k| k.template_slug()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), kinds.len());
    }

    #[test]
    fn test_notification_builder() {
        let note = Notification::new(NotificationKind::TaskProposed, "m@x.com", "Mel")
            .with_params(json!({ "task_title": "Inventory audit" }));

        assert_eq!(note.to_email, "m@x.com");
        assert_eq!(note.params["task_title"], "Inventory audit");
    }

    #[tokio::test]
    async fn test_noop_notifier_always_succeeds() {
        let notifier = NoopNotifier;
        let note = Notification::new(NotificationKind::AccountActivated, "a@x.com", "Ada");
        assert!(notifier.send(&note).await.is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_survives_failures() {
        struct FailingNotifier;

        #[async_trait]
        impl Notifier for FailingNotifier {
            async fn send(&self, _note: &Notification) -> Result<(), NotifyError> {
                Err(NotifyError::Transport("connection refused".into()))
            }
        }

        let notifier: Arc<dyn Notifier> = Arc::new(FailingNotifier);
        let note = Notification::new(NotificationKind::TaskProposed, "m@x.com", "Mel");

        // Must not panic or propagate; the failure is logged and dropped.
        dispatch(&notifier, note);
        tokio::task::yield_now().await;
    }
}
