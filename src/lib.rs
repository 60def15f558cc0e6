//! Post-payment verification for the storefront mini-app.
//!
//! After the user is redirected back from the payment gateway there is no
//! webhook or push channel to confirm the charge. This crate polls the
//! storefront status endpoint under a bounded exponential-backoff schedule
//! and reduces whatever the backend reports to one definitive outcome the
//! owning view can render, together with a human-readable activity feed.

pub mod activity;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod not_found;
pub mod scheduler;
pub mod session;
pub mod status;

pub use activity::{ActivityLog, LogEntry, Severity};
pub use config::{ConfigError, GatewayConfig, VerifierConfig};
pub use gateway::{HttpGateway, ProbeError, ProbeResult, StatusCheck, StatusProbe};
pub use scheduler::{PollScheduler, SchedulerError};
pub use session::{VerificationSession, VerificationSnapshot};
pub use status::{classify, VerificationStatus};
