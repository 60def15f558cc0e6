use crate::activity::{ActivityLog, LogEntry};
use crate::status::VerificationStatus;
use serde::Serialize;
use uuid::Uuid;

/// One verification session per mounted checkout view.
///
/// Created with the subject to verify and mutated exclusively from the poll
/// scheduler's own cycle; nothing else writes to it once polling starts.
#[derive(Debug)]
pub struct VerificationSession {
    /// Correlation id for log output; carries no control-flow meaning.
    pub session_id: Uuid,
    /// Opaque identifier of the order or top-up being verified.
    pub subject_id: String,
    /// Selects top-up endpoint semantics instead of order semantics.
    pub is_top_up: bool,
    /// Polls issued so far. Monotonically increasing until the session stops.
    pub attempt: u32,
    /// Immediately-preceding polls that returned "subject not found".
    /// Reset to zero by any non-404 response.
    pub consecutive_not_found: u32,
    pub status: VerificationStatus,
    /// Latches: once true it never reverts.
    pub is_complete: bool,
    pub log: ActivityLog,
}

impl VerificationSession {
    pub fn new(subject_id: impl Into<String>, is_top_up: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            is_top_up,
            attempt: 0,
            consecutive_not_found: 0,
            status: VerificationStatus::Checking,
            is_complete: false,
            log: ActivityLog::default(),
        }
    }

    /// What the subject is called in user-facing feed lines.
    pub fn subject_kind(&self) -> &'static str {
        if self.is_top_up {
            "top-up"
        } else {
            "order"
        }
    }

    /// A positive classified status alone is not success: polling may still
    /// be in flight. Success requires the session to have completed.
    pub fn is_success(&self) -> bool {
        self.is_complete && self.status.is_positive()
    }

    pub fn is_failure(&self) -> bool {
        self.is_complete
            && matches!(
                self.status,
                VerificationStatus::Expired | VerificationStatus::Failed
            )
    }

    /// Freeze the current state into the read surface handed to the view.
    pub fn snapshot(&self) -> VerificationSnapshot {
        VerificationSnapshot {
            status: self.status,
            is_complete: self.is_complete,
            is_success: self.is_success(),
            is_failure: self.is_failure(),
            attempt_count: self.attempt,
            log: self.log.to_vec(),
        }
    }
}

/// Read-only view of a session, emitted to the collaborator on every update.
///
/// Navigation and retry affordances are the collaborator's decision; the
/// verification core only ever reports.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationSnapshot {
    pub status: VerificationStatus,
    pub is_complete: bool,
    pub is_success: bool,
    pub is_failure: bool,
    pub attempt_count: u32,
    pub log: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_checking_with_zeroed_counters() {
        let session = VerificationSession::new("ord_1", false);
        assert_eq!(session.status, VerificationStatus::Checking);
        assert_eq!(session.attempt, 0);
        assert_eq!(session.consecutive_not_found, 0);
        assert!(!session.is_complete);
        assert!(session.log.is_empty());
        assert_eq!(session.subject_kind(), "order");
    }

    #[test]
    fn top_up_sessions_are_labelled_as_such() {
        let session = VerificationSession::new("top_9", true);
        assert_eq!(session.subject_kind(), "top-up");
    }

    #[test]
    fn paid_without_completion_is_not_yet_success() {
        let mut session = VerificationSession::new("ord_1", false);
        session.status = VerificationStatus::Paid;
        assert!(!session.is_success());

        session.is_complete = true;
        assert!(session.is_success());
    }

    #[test]
    fn partial_counts_as_success_once_complete() {
        let mut session = VerificationSession::new("ord_1", false);
        session.status = VerificationStatus::Partial;
        session.is_complete = true;
        assert!(session.is_success());
        assert!(!session.is_failure());
    }

    #[test]
    fn expired_and_failed_are_failures_only_when_complete() {
        let mut session = VerificationSession::new("ord_1", false);
        session.status = VerificationStatus::Failed;
        assert!(!session.is_failure());

        session.is_complete = true;
        assert!(session.is_failure());

        session.status = VerificationStatus::Expired;
        assert!(session.is_failure());
    }

    #[test]
    fn exhausted_pending_session_is_neither_success_nor_failure() {
        let mut session = VerificationSession::new("ord_1", false);
        session.status = VerificationStatus::Pending;
        session.is_complete = true;
        assert!(!session.is_success());
        assert!(!session.is_failure());
    }

    #[test]
    fn snapshot_mirrors_session_fields() {
        let mut session = VerificationSession::new("ord_1", false);
        session.attempt = 4;
        session.status = VerificationStatus::Delivered;
        session.is_complete = true;
        session
            .log
            .append("order delivered", crate::activity::Severity::Success);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, VerificationStatus::Delivered);
        assert_eq!(snapshot.attempt_count, 4);
        assert!(snapshot.is_complete);
        assert!(snapshot.is_success);
        assert!(!snapshot.is_failure);
        assert_eq!(snapshot.log.len(), 1);
    }

    #[test]
    fn snapshot_serializes_for_the_collaborator() {
        let session = VerificationSession::new("ord_1", false);
        let json = serde_json::to_value(session.snapshot()).expect("serialize");
        assert_eq!(json["status"], serde_json::json!("checking"));
        assert_eq!(json["is_complete"], serde_json::json!(false));
        assert_eq!(json["attempt_count"], serde_json::json!(0));
    }
}
