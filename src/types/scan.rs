use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ScanResult;

/// Where a scan cycle currently is.
///
/// `Idle -> FetchingUniverse -> Evaluating -> Ranking -> Committed`, or
/// `Failed` when the cycle could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    FetchingUniverse,
    Evaluating { queued: usize },
    Ranking { candidates: usize },
    Committed { instruments_updated: usize },
    Failed { reason: String },
}

impl ScanPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingUniverse => "fetching_universe",
            Self::Evaluating { .. } => "evaluating",
            Self::Ranking { .. } => "ranking",
            Self::Committed { .. } => "committed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::Failed { .. })
    }
}

/// Summary of one completed scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Symbols the universe source returned.
    pub universe_size: usize,
    /// Symbols that passed every criterion.
    pub passed: usize,
    /// Symbols evaluated but failing a criterion.
    pub rejected: usize,
    /// Symbols skipped because of upstream or payload errors.
    pub failed: usize,
    /// Symbols abandoned when the deadline expired.
    pub incomplete: usize,
    pub timed_out: bool,
    pub result: ScanResult,
    pub instruments_updated: usize,
}

/// Response body of the scan trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruments_updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    pub fn updated(count: usize) -> Self {
        Self {
            success: true,
            instruments_updated: Some(count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            instruments_updated: None,
            error: Some(error.into()),
        }
    }
}
