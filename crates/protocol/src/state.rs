//! Task lifecycle states
//!
//! The linear state machine every export task moves through. Transitions
//! are validated by the lifecycle controller; this module only encodes
//! which transitions are legal.

use crate::error::ProtocolError;

/// Lifecycle state of an export task
///
/// Legal transitions:
/// ```text
/// Queued → Processing → Uploading → Completed
///    └─────────┴────────────┴──→ Failed
/// ```
///
/// Terminal states (`Completed`, `Failed`) are reached at most once and
/// never left. No state is re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Admitted to the queue, not yet picked up by a worker
    Queued,
    /// A worker is ingesting records into the artifact
    Processing,
    /// Artifact finalized, object-store upload in flight
    Uploading,
    /// Signed URL published
    Completed,
    /// Terminal failure, error code recorded
    Failed,
}

impl TaskState {
    /// Whether this state is terminal (never left once entered)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a transition from `self` to `to` is legal
    pub fn can_transition(&self, to: TaskState) -> bool {
        match (self, to) {
            (Self::Queued, Self::Processing) => true,
            (Self::Processing, Self::Uploading) => true,
            (Self::Uploading, Self::Completed) => true,
            // Any non-terminal state may fail
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Stable name used in logs and responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Uploading => "UPLOADING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Wire discriminant
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            Self::Queued => 1,
            Self::Processing => 2,
            Self::Uploading => 3,
            Self::Completed => 4,
            Self::Failed => 5,
        }
    }

    /// Parse a wire discriminant
    pub(crate) fn from_wire(v: u8) -> Result<Self, ProtocolError> {
        match v {
            1 => Ok(Self::Queued),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Uploading),
            4 => Ok(Self::Completed),
            5 => Ok(Self::Failed),
            other => Err(ProtocolError::UnknownState(other)),
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
