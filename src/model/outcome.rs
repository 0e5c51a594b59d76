use crate::model::AccountId;
use serde::{Deserialize, Serialize};

/// The most failure messages that are repeated in a run summary.
pub const SUMMARY_FAILURE_LIMIT: usize = 10;

/// The tally of one sync run.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Accounts whose row was found and for which metrics were requested.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Eligible accounts whose row could not be located.
    pub skipped: usize,
    /// Fields that could not be read from a result row and were reported as zero.
    pub degraded_fields: usize,
    /// `"<account>: <message>"` for each failed account, in processing order.
    pub failure_messages: Vec<String>,
}

impl SyncOutcome {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    /// Records a failed account and returns the formatted failure message.
    pub fn record_failure(&mut self, account: &AccountId, message: impl AsRef<str>) -> String {
        self.attempted += 1;
        self.failed += 1;
        let formatted = format!("{account}: {}", message.as_ref());
        self.failure_messages.push(formatted.clone());
        formatted
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// The body of the run summary: counts followed by up to `SUMMARY_FAILURE_LIMIT` failure
    /// messages.
    pub fn summary(&self) -> String {
        let mut body = format!(
            "✅ **Processed:** {}\n❌ **Errors:** {}",
            self.succeeded, self.failed
        );
        if self.skipped > 0 {
            body.push_str(&format!("\n⏭️ **Skipped:** {}", self.skipped));
        }
        if !self.failure_messages.is_empty() {
            body.push_str("\n\n**Error Details:**\n");
            for message in self.failure_messages.iter().take(SUMMARY_FAILURE_LIMIT) {
                body.push_str(&format!("• {message}\n"));
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut outcome = SyncOutcome::default();
        outcome.record_success();
        let message = outcome.record_failure(&AccountId::new("111-222-3333"), "boom");
        outcome.record_skip();
        assert_eq!(message, "1112223333: boom");
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.has_failures());
    }

    #[test]
    fn test_summary_limits_failures() {
        let mut outcome = SyncOutcome::default();
        for i in 0..15 {
            outcome.record_failure(&AccountId::new(format!("{i}")), "failed");
        }
        let summary = outcome.summary();
        assert!(summary.contains("**Errors:** 15"));
        assert!(summary.contains("• 9: failed"));
        assert!(!summary.contains("• 10: failed"));
        assert_eq!(summary.matches('•').count(), SUMMARY_FAILURE_LIMIT);
    }

    #[test]
    fn test_summary_without_failures() {
        let mut outcome = SyncOutcome::default();
        outcome.record_success();
        let summary = outcome.summary();
        assert!(summary.contains("**Processed:** 1"));
        assert!(!summary.contains("Error Details"));
    }
}
