//! Frame errors.

use enveil_core::DispatchError;
use thiserror::Error;

use crate::FrameStatus;

/// Errors returned by [`crate::Frame`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Operation is not valid in the current state.
    #[error("cannot {operation} while {status:?}")]
    InvalidTransition {
        /// Attempted operation.
        operation: &'static str,
        /// State the frame was in.
        status: FrameStatus,
    },

    /// Inbound event has no registered handler.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
