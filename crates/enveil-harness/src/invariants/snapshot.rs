//! Observable state snapshots for invariant checking.
//!
//! Invariants run on snapshots rather than live state so one check sees a
//! consistent picture.

use enveil_controller::{ControllerState, MailController, MailFormatter};
use enveil_core::ControllerId;
use enveil_frame::{Frame, FrameStatus, HostPage, StatusMarker};

use crate::{sim_editor::EditorLog, sim_host::SimHost};

/// Snapshot of every frame and controller in a simulation.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Frame states.
    pub frames: Vec<FrameSnapshot>,
    /// Controller states.
    pub controllers: Vec<ControllerSnapshot>,
}

impl SystemSnapshot {
    /// Add a frame.
    #[must_use]
    pub fn with_frame(mut self, frame: FrameSnapshot) -> Self {
        self.frames.push(frame);
        self
    }

    /// Add a controller.
    #[must_use]
    pub fn with_controller(mut self, controller: ControllerSnapshot) -> Self {
        self.controllers.push(controller);
        self
    }
}

/// Observable state of one frame and its page.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Frame id.
    pub id: String,
    /// Lifecycle state.
    pub status: FrameStatus,
    /// Status attribute on the compose element.
    pub marker: Option<StatusMarker>,
    /// Overlays mounted next to the element.
    pub overlays: usize,
    /// Whether the frame holds an open port.
    pub port_open: bool,
}

impl FrameSnapshot {
    /// Capture a frame running on a [`SimHost`].
    pub fn of(frame: &Frame<SimHost>) -> Self {
        let page = frame.host().page();
        Self {
            id: frame.id().to_string(),
            status: frame.status(),
            marker: frame.host().status_marker(),
            overlays: page.overlays,
            port_open: frame.is_port_open(),
        }
    }
}

/// Observable state of one controller.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    /// Controller id.
    pub id: ControllerId,
    /// Workflow state.
    pub state: ControllerState,
    /// Editor session slot occupied.
    pub has_session: bool,
    /// Pending action slot occupied.
    pub has_pending: bool,
    /// Encrypt calls the editor is currently serving for this controller.
    pub outstanding_encrypts: usize,
}

impl ControllerSnapshot {
    /// Capture a controller.
    pub fn of<F: MailFormatter>(controller: &MailController<F>) -> Self {
        Self {
            id: controller.id().clone(),
            state: controller.state(),
            has_session: controller.has_session(),
            has_pending: controller.pending().is_some(),
            outstanding_encrypts: 0,
        }
    }

    /// Take the outstanding encrypt count from the editor log.
    #[must_use]
    pub fn with_editor(mut self, log: &EditorLog) -> Self {
        self.outstanding_encrypts = log.outstanding.get(&self.id).copied().unwrap_or(0);
        self
    }
}
