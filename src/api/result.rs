//! Closed result codes returned by every command

use std::fmt;
use serde::{Deserialize, Serialize};
use wardrobe_core::{ApplyOutcome, Error as CoreError};

/// Outcome of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResultCode {
    /// The command changed something
    Success = 0,
    /// The command was valid but nothing needed to change
    NothingDone = 1,
    /// The entity is unknown to the host
    ActorNotFound = 2,
    /// The entity is locked with a different key
    InvalidKey = 3,
    /// Malformed input or missing document
    InvalidState = 4,
    /// A value or item does not belong where it was given
    CategoryMismatch = 5,
    /// The item does not exist
    ItemInvalid = 6,
}

impl ResultCode {
    /// Stable name, used as a metrics label
    pub const fn as_str(self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::NothingDone => "nothing_done",
            ResultCode::ActorNotFound => "actor_not_found",
            ResultCode::InvalidKey => "invalid_key",
            ResultCode::InvalidState => "invalid_state",
            ResultCode::CategoryMismatch => "category_mismatch",
            ResultCode::ItemInvalid => "item_invalid",
        }
    }

    /// Whether the command did not fail
    pub const fn is_ok(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::NothingDone)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&CoreError> for ResultCode {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::Locked { .. } => ResultCode::InvalidKey,
            CoreError::ActorNotFound(_) => ResultCode::ActorNotFound,
            CoreError::CategoryMismatch { .. } => ResultCode::CategoryMismatch,
            CoreError::ItemInvalid(_) => ResultCode::ItemInvalid,
            CoreError::InvalidState(_)
            | CoreError::UnsupportedVersion(_)
            | CoreError::Truncated { .. }
            | CoreError::CycleRejected { .. }
            | CoreError::DuplicateLink { .. }
            | CoreError::WriteProtected(_)
            | CoreError::Serialization(_) => ResultCode::InvalidState,
        }
    }
}

impl From<ApplyOutcome> for ResultCode {
    fn from(outcome: ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Success(_) => ResultCode::Success,
            ApplyOutcome::NothingDone => ResultCode::NothingDone,
        }
    }
}
