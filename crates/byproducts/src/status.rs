use core::str::FromStr;

use serde::{Deserialize, Serialize};

use alutrack_core::DomainError;

/// Lifecycle status of a by-product batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Initial state, assigned at creation.
    Received,
    InProcess,
    Used,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 3] = [
        BatchStatus::Received,
        BatchStatus::InProcess,
        BatchStatus::Used,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Received => "received",
            BatchStatus::InProcess => "in_process",
            BatchStatus::Used => "used",
        }
    }

    /// Has the processing team picked this batch up?
    pub fn is_processed(&self) -> bool {
        matches!(self, BatchStatus::InProcess | BatchStatus::Used)
    }

    fn stage(&self) -> u8 {
        match self {
            BatchStatus::Received => 0,
            BatchStatus::InProcess => 1,
            BatchStatus::Used => 2,
        }
    }
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "received" => Ok(BatchStatus::Received),
            "in_process" => Ok(BatchStatus::InProcess),
            "used" => Ok(BatchStatus::Used),
            other => Err(DomainError::validation(format!(
                "unknown batch status '{other}' (expected received, in_process or used)"
            ))),
        }
    }
}

/// Which status changes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any status may follow any other, including moving back to `received`.
    #[default]
    Unrestricted,
    /// Status may stay or move forward (`received → in_process → used`), never back.
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn allows(&self, from: BatchStatus, to: BatchStatus) -> bool {
        match self {
            TransitionPolicy::Unrestricted => true,
            TransitionPolicy::ForwardOnly => to.stage() >= from.stage(),
        }
    }
}
