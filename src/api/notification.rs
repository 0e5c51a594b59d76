use crate::api::Notifier;
use crate::model::{AccountId, SyncOutcome};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// How a notification is colored in the operator channel.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

serde_plain::derive_display_from_serialize!(Severity);

impl Severity {
    /// The embed color, as a 24-bit RGB integer.
    pub fn color(self) -> u32 {
        match self {
            Severity::Success => 3_066_993,
            Severity::Warning => 16_776_960,
            Severity::Error => 15_158_332,
        }
    }
}

/// A message for the operator channel.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
        }
    }

    /// Sent immediately when a single account fails.
    pub fn account_failure(account: &AccountId, error: impl AsRef<str>) -> Self {
        Self::new(
            "🚨 Sheets Sync Error",
            format!("**Account:** {account}\n**Error:** {}", error.as_ref()),
            Severity::Error,
        )
    }

    /// Sent when the run cannot continue at all.
    pub fn fatal(error: impl AsRef<str>) -> Self {
        Self::new(
            "🚨 Sheets Sync Error",
            format!("**Error:** Fatal error: {}", error.as_ref()),
            Severity::Error,
        )
    }

    /// Sent at the end of every run.
    pub fn summary(outcome: &SyncOutcome) -> Self {
        let (emoji, severity) = if outcome.has_failures() {
            ("⚠️", Severity::Warning)
        } else {
            ("✅", Severity::Success)
        };
        Self::new(
            format!("{emoji} Sheets Sync Complete"),
            outcome.summary(),
            severity,
        )
    }
}

/// A `Notifier` that keeps every notification in memory and logs it. Clones share the same
/// storage, so a test can hand one clone to the code under test and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct TestNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl TestNotifier {
    /// A notifier whose deliveries always fail (after recording them).
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl Notifier for TestNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            "[{}] {}: {}",
            notification.severity, notification.title, notification.body
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        if self.fail {
            anyhow::bail!("Notification delivery failed");
        }
        Ok(())
    }
}
