use crate::activity::Severity;
use crate::config::VerifierConfig;
use crate::gateway::{ProbeError, StatusCheck, StatusProbe};
use crate::not_found::{NotFoundDisposition, NotFoundPolicy};
use crate::session::{VerificationSession, VerificationSnapshot};
use crate::status::{classify, VerificationStatus};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    /// `start` was called on a scheduler that is already running or has
    /// already run. A fresh verification needs a fresh scheduler.
    #[error("verification already started for subject {subject_id}")]
    AlreadyStarted { subject_id: String },
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What the loop should do after a processed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollDecision {
    Continue,
    Stop,
}

type UpdateFn = Arc<dyn Fn(VerificationSnapshot) + Send + Sync>;

/// Drives repeated status checks for one subject under a bounded
/// exponential-backoff schedule and decides when to stop.
///
/// The session is owned by this scheduler: one poll is in flight at a time,
/// results are processed strictly in issuance order, and the only suspension
/// points are the probe call and the backoff sleep. Dropping the scheduler
/// cancels whichever of the two is pending.
pub struct PollScheduler {
    probe: Arc<dyn StatusProbe>,
    config: VerifierConfig,
    policy: NotFoundPolicy,
    session: Arc<Mutex<VerificationSession>>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    started: bool,
}

impl PollScheduler {
    pub fn new(
        subject_id: impl Into<String>,
        is_top_up: bool,
        probe: Arc<dyn StatusProbe>,
        config: VerifierConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let policy = NotFoundPolicy {
            escalate_after: config.not_found_threshold,
            grace_attempts: config.not_found_grace_attempts,
        };
        Self {
            probe,
            config,
            policy,
            session: Arc::new(Mutex::new(VerificationSession::new(subject_id, is_top_up))),
            shutdown_tx,
            task: None,
            started: false,
        }
    }

    /// Begin polling. The first status check fires with no delay; `on_update`
    /// receives a snapshot after every poll and on each scheduled wait.
    ///
    /// Calling `start` a second time is an error rather than a silent
    /// re-schedule: the session's counters are single-use.
    pub fn start<F>(&mut self, on_update: F) -> Result<(), SchedulerError>
    where
        F: Fn(VerificationSnapshot) + Send + Sync + 'static,
    {
        if self.started {
            let subject_id = lock(&self.session).subject_id.clone();
            return Err(SchedulerError::AlreadyStarted { subject_id });
        }
        self.started = true;

        let worker = PollWorker {
            probe: Arc::clone(&self.probe),
            config: self.config.clone(),
            policy: self.policy,
            session: Arc::clone(&self.session),
            shutdown_rx: self.shutdown_tx.subscribe(),
            on_update: Arc::new(on_update),
        };
        self.task = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Cancel any pending wait or in-flight check and latch completion
    /// without touching the classified status.
    ///
    /// Used on view teardown, not as a normal termination path. Safe to call
    /// repeatedly and after natural completion; a check result that is still
    /// in flight when this runs is discarded, never applied.
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        let mut session = lock(&self.session);
        if !session.is_complete {
            session.is_complete = true;
            debug!(
                session_id = %session.session_id,
                subject_id = %session.subject_id,
                "verification stopped before completion"
            );
        }
    }

    /// Current read surface for the owning view.
    pub fn snapshot(&self) -> VerificationSnapshot {
        lock(&self.session).snapshot()
    }

    pub fn is_complete(&self) -> bool {
        lock(&self.session).is_complete
    }

    /// Whether the poll task has been spawned and is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        // A torn-down view must never leave a timer armed.
        self.stop();
    }
}

fn lock(session: &Arc<Mutex<VerificationSession>>) -> MutexGuard<'_, VerificationSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

struct PollWorker {
    probe: Arc<dyn StatusProbe>,
    config: VerifierConfig,
    policy: NotFoundPolicy,
    session: Arc<Mutex<VerificationSession>>,
    shutdown_rx: watch::Receiver<bool>,
    on_update: UpdateFn,
}

impl PollWorker {
    async fn run(mut self) {
        let (subject_id, is_top_up) = {
            let mut session = lock(&self.session);
            let message = format!(
                "verifying {} {}",
                session.subject_kind(),
                session.subject_id
            );
            session.log.append(message, Severity::Info);
            info!(
                session_id = %session.session_id,
                subject_id = %session.subject_id,
                is_top_up = session.is_top_up,
                max_attempts = self.config.max_attempts,
                "payment verification started"
            );
            (session.subject_id.clone(), session.is_top_up)
        };

        loop {
            let polls_done = lock(&self.session).attempt;
            if polls_done > 0 {
                let delay = self.config.backoff_delay(polls_done);
                {
                    let mut session = lock(&self.session);
                    session
                        .log
                        .append(format!("retrying in {}s…", delay.as_secs()), Severity::Info);
                }
                self.emit();
                tokio::select! {
                    _ = self.shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if *self.shutdown_rx.borrow() {
                break;
            }

            {
                let mut session = lock(&self.session);
                session.attempt += 1;
                let message = format!(
                    "querying payment gateway (attempt {}/{})",
                    session.attempt, self.config.max_attempts
                );
                session.log.append(message, Severity::Info);
            }

            let probe = Arc::clone(&self.probe);
            let result = tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                result = probe.check_status(&subject_id, is_top_up) => result,
            };

            let decision = {
                let mut session = lock(&self.session);
                if *self.shutdown_rx.borrow() {
                    // The view tore down while the check was in flight; the
                    // result must not touch a detached session.
                    break;
                }
                apply_poll_result(&mut session, result, &self.config, &self.policy)
            };
            self.emit();
            if decision == PollDecision::Stop {
                break;
            }
        }
    }

    fn emit(&self) {
        let snapshot = lock(&self.session).snapshot();
        (self.on_update)(snapshot);
    }
}

// ---------------------------------------------------------------------------
// Poll-result processing
// ---------------------------------------------------------------------------

/// Apply one poll result to the session, then evaluate the stop conditions
/// in priority order: escalated not-found, terminal status, attempt budget.
///
/// The not-found check runs first. A 404 and a classified payload are
/// mutually exclusive within a single poll, so the ordering is invisible
/// today, but it must stay fixed in case the status vocabulary ever grows.
fn apply_poll_result(
    session: &mut VerificationSession,
    result: Result<StatusCheck, ProbeError>,
    config: &VerifierConfig,
    policy: &NotFoundPolicy,
) -> PollDecision {
    match result {
        Err(ProbeError::NotFound) => record_not_found(session, policy),
        Ok(check) if check.http_status == 404 => record_not_found(session, policy),
        Ok(check) => {
            policy.record_hit(session);
            let status = classify(&check.raw_status);
            session.status = status;
            session
                .log
                .append(format!("gateway reports status: {}", status), Severity::Info);
            debug!(
                session_id = %session.session_id,
                attempt = session.attempt,
                raw_status = %check.raw_status,
                status = %status,
                "poll classified"
            );
        }
        Err(err) => {
            // Transient transport trouble counts as a non-404 response: it
            // clears the miss streak and the schedule simply continues.
            policy.record_hit(session);
            session.status = VerificationStatus::Unknown;
            session
                .log
                .append(format!("status check failed: {}", err), Severity::Warning);
            warn!(
                session_id = %session.session_id,
                subject_id = %session.subject_id,
                attempt = session.attempt,
                error = %err,
                "status check failed; will retry"
            );
        }
    }

    // Stop condition 1: the subject never materialized.
    if session.consecutive_not_found >= policy.escalate_after {
        session.status = VerificationStatus::Failed;
        session.is_complete = true;
        let message = format!(
            "{} could not be found after {} checks; giving up",
            session.subject_kind(),
            session.consecutive_not_found
        );
        session.log.append(message, Severity::Error);
        warn!(
            session_id = %session.session_id,
            subject_id = %session.subject_id,
            attempts = session.attempt,
            "subject never appeared; verification failed"
        );
        return PollDecision::Stop;
    }

    // Stop condition 2: the gateway gave a definitive answer.
    if session.status.is_terminal() {
        session.is_complete = true;
        match session.status {
            VerificationStatus::Delivered => {
                let message = format!("payment confirmed, {} delivered", session.subject_kind());
                session.log.append(message, Severity::Success);
                info!(
                    session_id = %session.session_id,
                    subject_id = %session.subject_id,
                    attempts = session.attempt,
                    "verification succeeded"
                );
            }
            VerificationStatus::Expired => {
                session
                    .log
                    .append("payment window expired", Severity::Error);
                warn!(
                    session_id = %session.session_id,
                    subject_id = %session.subject_id,
                    "payment expired"
                );
            }
            _ => {
                session.log.append("payment failed", Severity::Error);
                warn!(
                    session_id = %session.session_id,
                    subject_id = %session.subject_id,
                    "payment failed"
                );
            }
        }
        return PollDecision::Stop;
    }

    // Stop condition 3: out of attempts. The last-seen status is preserved;
    // this is a soft "check again later", not a failure.
    if session.attempt >= config.max_attempts {
        session.is_complete = true;
        session.log.append(
            "verification timed out; check your orders later",
            Severity::Warning,
        );
        warn!(
            session_id = %session.session_id,
            subject_id = %session.subject_id,
            attempts = session.attempt,
            last_status = %session.status,
            "attempt budget exhausted without a terminal status"
        );
        return PollDecision::Stop;
    }

    PollDecision::Continue
}

fn record_not_found(session: &mut VerificationSession, policy: &NotFoundPolicy) {
    match policy.record_miss(session) {
        NotFoundDisposition::Transient => {
            let message = format!("{} not visible yet, waiting…", session.subject_kind());
            session.log.append(message, Severity::Info);
        }
        NotFoundDisposition::Persistent => {
            let message = format!(
                "{} still not found (attempt {})",
                session.subject_kind(),
                session.attempt
            );
            session.log.append(message, Severity::Warning);
        }
        // The escalation itself is logged by the stop-condition pass.
        NotFoundDisposition::Escalated => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
