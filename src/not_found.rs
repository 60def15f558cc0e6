use crate::session::VerificationSession;

/// How a single "subject not found" response should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundDisposition {
    /// Early miss, expected while the order record replicates.
    Transient,
    /// Still missing late in the schedule; logged as a warning but polling
    /// continues.
    Persistent,
    /// The consecutive-miss threshold was reached; the subject is treated
    /// as nonexistent and verification fails.
    Escalated,
}

/// Consecutive-miss policy separating replication lag from a bad subject id.
///
/// Holds no state of its own; the counters live on the session and this is
/// applied once per poll.
#[derive(Debug, Clone, Copy)]
pub struct NotFoundPolicy {
    /// Consecutive misses that escalate verification to a hard failure.
    pub escalate_after: u32,
    /// Attempts for which a miss is logged softly rather than as a warning.
    pub grace_attempts: u32,
}

impl Default for NotFoundPolicy {
    fn default() -> Self {
        Self {
            escalate_after: 3,
            grace_attempts: 3,
        }
    }
}

impl NotFoundPolicy {
    /// Record a not-found response for the poll that just completed.
    ///
    /// Escalation is keyed on the consecutive-miss streak, not the overall
    /// attempt number, so a late run of misses fails just as fast as an
    /// early one.
    pub fn record_miss(&self, session: &mut VerificationSession) -> NotFoundDisposition {
        session.consecutive_not_found += 1;
        if session.consecutive_not_found >= self.escalate_after {
            NotFoundDisposition::Escalated
        } else if session.attempt <= self.grace_attempts {
            NotFoundDisposition::Transient
        } else {
            NotFoundDisposition::Persistent
        }
    }

    /// Any non-404 response clears the miss streak.
    pub fn record_hit(&self, session: &mut VerificationSession) {
        session.consecutive_not_found = 0;
    }
}
