//! Remote transaction status and its classification into terminal buckets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction status as reported by the signing service
///
/// Values the service may add later land in [`TransactionStatus::Unknown`]
/// and classify as pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Submitted,
    Queued,
    PendingAmlScreening,
    PendingAuthorization,
    PendingSignature,
    Pending3rdParty,
    Broadcasting,
    Confirming,
    Completed,
    Cancelling,
    Cancelled,
    Blocked,
    Rejected,
    Failed,
    Unknown(String),
}

/// Semantic bucket of a [`TransactionStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBucket {
    Pending,
    Success,
    Failure,
    Cancelled,
}

impl StatusBucket {
    pub fn is_terminal(self) -> bool {
        self != StatusBucket::Pending
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Queued => "QUEUED",
            Self::PendingAmlScreening => "PENDING_AML_SCREENING",
            Self::PendingAuthorization => "PENDING_AUTHORIZATION",
            Self::PendingSignature => "PENDING_SIGNATURE",
            Self::Pending3rdParty => "PENDING_3RD_PARTY",
            Self::Broadcasting => "BROADCASTING",
            Self::Confirming => "CONFIRMING",
            Self::Completed => "COMPLETED",
            Self::Cancelling => "CANCELLING",
            Self::Cancelled => "CANCELLED",
            Self::Blocked => "BLOCKED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
            Self::Unknown(other) => other,
        }
    }

    /// Status Classifier. Total and pure; anything unrecognised is pending.
    pub fn classify(&self) -> StatusBucket {
        match self {
            Self::Completed => StatusBucket::Success,
            Self::Cancelled => StatusBucket::Cancelled,
            Self::Failed | Self::Blocked | Self::Rejected => StatusBucket::Failure,
            _ => StatusBucket::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.classify().is_terminal()
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SUBMITTED" => Self::Submitted,
            "QUEUED" => Self::Queued,
            "PENDING_AML_SCREENING" => Self::PendingAmlScreening,
            "PENDING_AUTHORIZATION" => Self::PendingAuthorization,
            "PENDING_SIGNATURE" => Self::PendingSignature,
            "PENDING_3RD_PARTY" => Self::Pending3rdParty,
            "BROADCASTING" => Self::Broadcasting,
            "CONFIRMING" => Self::Confirming,
            "COMPLETED" => Self::Completed,
            "CANCELLING" => Self::Cancelling,
            "CANCELLED" => Self::Cancelled,
            "BLOCKED" => Self::Blocked,
            "REJECTED" => Self::Rejected,
            "FAILED" => Self::Failed,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
