//! Frame side effects.
//!
//! Host page mutations happen synchronously through [`crate::HostPage`]; only
//! the effects that need the port or a timer are returned as actions.

use std::time::Duration;

use enveil_core::Message;

/// Actions produced by the [`crate::Frame`] state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// Connect a port with this name to the background.
    OpenPort {
        /// `frame-<id>`.
        name: String,
    },

    /// Send a message to the controller.
    Emit(Message),

    /// Call [`crate::Frame::finalize_close`] after `delay`.
    ScheduleFinalize {
        /// Exit animation length.
        delay: Duration,
    },

    /// Disconnect the port. Produced at most once per frame.
    DisconnectPort,
}
