use serde::{Deserialize, Serialize};

/// Classified state of a payment verification session.
///
/// `Checking` is the initial state only; [`classify`] never returns it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Checking,
    /// Payment confirmed, fulfillment still in progress.
    Paid,
    /// Every item fulfilled; terminal success.
    Delivered,
    /// Some items fulfilled. Positive for display, but not terminal.
    Partial,
    /// Payment not yet seen by the gateway.
    Pending,
    Expired,
    Failed,
    /// Unrecognized backend vocabulary or a non-404 transport failure.
    Unknown,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Checking => "checking",
            VerificationStatus::Paid => "paid",
            VerificationStatus::Delivered => "delivered",
            VerificationStatus::Partial => "partial",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Expired => "expired",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Unknown => "unknown",
        }
    }

    /// Terminal states stop the polling loop on sight.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Delivered | VerificationStatus::Expired | VerificationStatus::Failed
        )
    }

    /// Positive outcomes for display once the session has completed.
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Delivered | VerificationStatus::Paid | VerificationStatus::Partial
        )
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a raw gateway status string to a classified status.
///
/// Total and case-insensitive: every input maps to exactly one variant and
/// unrecognized vocabulary becomes `Unknown` rather than an error. A 404 is
/// intercepted by the not-found policy before classification is attempted.
pub fn classify(raw: &str) -> VerificationStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "paid" | "processing" | "prepaid" => VerificationStatus::Paid,
        "delivered" | "completed" | "ready" => VerificationStatus::Delivered,
        "partial" => VerificationStatus::Partial,
        "pending" | "awaiting_payment" => VerificationStatus::Pending,
        "expired" | "cancelled" => VerificationStatus::Expired,
        "failed" | "refunded" => VerificationStatus::Failed,
        _ => VerificationStatus::Unknown,
    }
}
