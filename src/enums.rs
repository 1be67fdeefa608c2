use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─── PurchaseStatus ──────────────────────────────────────────────────

/// Lifecycle of an auto-sell purchase.
///
/// ```text
/// pending ──► held ──► selling ──► sold
///    │          │         │
///    ▼          ▼         ▼
/// cancelled  cancelled  held (sell failed, retried later)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    /// Buy transaction broadcast, not yet confirmed.
    Pending,
    /// Buy confirmed; waiting for the auto-sell time.
    Held,
    /// Claimed by the auto-sell worker; sell in flight.
    Selling,
    Sold,
    Cancelled,
}

impl PurchaseStatus {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Held => "held",
            PurchaseStatus::Selling => "selling",
            PurchaseStatus::Sold => "sold",
            PurchaseStatus::Cancelled => "cancelled",
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition(&self, next: PurchaseStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseStatus::Pending, PurchaseStatus::Held)
                | (PurchaseStatus::Pending, PurchaseStatus::Cancelled)
                | (PurchaseStatus::Held, PurchaseStatus::Selling)
                | (PurchaseStatus::Held, PurchaseStatus::Cancelled)
                | (PurchaseStatus::Selling, PurchaseStatus::Sold)
                | (PurchaseStatus::Selling, PurchaseStatus::Held)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchaseStatus::Sold | PurchaseStatus::Cancelled)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PurchaseStatus::Pending),
            "held" => Ok(PurchaseStatus::Held),
            "selling" => Ok(PurchaseStatus::Selling),
            "sold" => Ok(PurchaseStatus::Sold),
            "cancelled" => Ok(PurchaseStatus::Cancelled),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid purchase status: {}. Supported: pending, held, selling, sold, cancelled",
                s
            ))),
        }
    }
}

// ─── SyncJobStatus ───────────────────────────────────────────────────

/// Status of a persisted catalog sync job. `failed` means attempts are
/// exhausted; `cancelled` means the chain was replaced by a force sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncJobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Queued => "queued",
            SyncJobStatus::Running => "running",
            SyncJobStatus::Succeeded => "succeeded",
            SyncJobStatus::Failed => "failed",
            SyncJobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncJobStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(SyncJobStatus::Queued),
            "running" => Ok(SyncJobStatus::Running),
            "succeeded" => Ok(SyncJobStatus::Succeeded),
            "failed" => Ok(SyncJobStatus::Failed),
            "cancelled" => Ok(SyncJobStatus::Cancelled),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid sync job status: {}. Supported: queued, running, succeeded, failed, cancelled",
                s
            ))),
        }
    }
}

// ─── SyncJobKind ─────────────────────────────────────────────────────

/// What a sync job does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobKind {
    /// Zero-work head of a job chain; only anchors the sequence.
    Placeholder,
    /// Fetches and stores a contiguous range of catalog pages.
    PageBatch,
}

impl SyncJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobKind::Placeholder => "placeholder",
            SyncJobKind::PageBatch => "page_batch",
        }
    }
}

impl fmt::Display for SyncJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncJobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "placeholder" => Ok(SyncJobKind::Placeholder),
            "page_batch" => Ok(SyncJobKind::PageBatch),
            _ => Err(AppError::InvalidInput(format!(
                "Invalid sync job kind: {}. Supported: placeholder, page_batch",
                s
            ))),
        }
    }
}
