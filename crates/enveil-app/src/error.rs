//! Runtime errors.

use enveil_core::PortError;
use enveil_frame::FrameError;
use thiserror::Error;

/// Errors that stop a runtime.
///
/// Per-message failures (unknown events, emits on a closed port, collaborator
/// errors) are logged and never end the loop.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The frame could not attach.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The frame's port could not be opened.
    #[error("port error: {0}")]
    Port(#[from] PortError),
}
