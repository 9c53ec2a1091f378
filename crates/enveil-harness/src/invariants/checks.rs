//! Standard invariant checks.

use enveil_controller::ControllerState;
use enveil_frame::{FrameStatus, StatusMarker};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A controller holds at most one editor session.
///
/// The session slot is occupied exactly while composing (or while a send of
/// that session awaits authorization), and the editor never serves two
/// encrypt calls for one controller at once.
pub struct SingleEditorSession;

impl Invariant for SingleEditorSession {
    fn name(&self) -> &'static str {
        "single_editor_session"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for controller in &state.controllers {
            let consistent = match controller.state {
                ControllerState::Idle => !controller.has_session,
                ControllerState::Composing => controller.has_session,
                ControllerState::AwaitingAuth => true,
            };
            if !consistent {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "controller {}: state {:?} with session {}",
                        controller.id, controller.state, controller.has_session
                    ),
                });
            }
            if controller.outstanding_encrypts > 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "controller {}: {} encrypt calls outstanding",
                        controller.id, controller.outstanding_encrypts
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A pending action exists exactly while awaiting authorization.
pub struct PendingOnlyWhileAwaitingAuth;

impl Invariant for PendingOnlyWhileAwaitingAuth {
    fn name(&self) -> &'static str {
        "pending_only_while_awaiting_auth"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for controller in &state.controllers {
            let awaiting = controller.state == ControllerState::AwaitingAuth;
            if controller.has_pending != awaiting {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "controller {}: state {:?} with pending {}",
                        controller.id, controller.state, controller.has_pending
                    ),
                });
            }
        }
        Ok(())
    }
}

/// One overlay while attached or detached, none otherwise.
pub struct OverlayMatchesStatus;

impl Invariant for OverlayMatchesStatus {
    fn name(&self) -> &'static str {
        "overlay_matches_status"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for frame in &state.frames {
            let expected = match frame.status {
                FrameStatus::Attached | FrameStatus::Detached => 1,
                FrameStatus::Unattached | FrameStatus::Destroyed => 0,
            };
            if frame.overlays != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "frame {}: {:?} with {} overlays, expected {expected}",
                        frame.id, frame.status, frame.overlays
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The status attribute mirrors the frame status; it is empty once the frame
/// is destroyed.
pub struct MarkerMatchesStatus;

impl Invariant for MarkerMatchesStatus {
    fn name(&self) -> &'static str {
        "marker_matches_status"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for frame in &state.frames {
            let consistent = match frame.status {
                FrameStatus::Attached => frame.marker == Some(StatusMarker::Attached),
                FrameStatus::Detached => frame.marker == Some(StatusMarker::Detached),
                FrameStatus::Destroyed => frame.marker.is_none(),
                FrameStatus::Unattached => {
                    !matches!(frame.marker, Some(StatusMarker::Attached | StatusMarker::Detached))
                },
            };
            if !consistent {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("frame {}: {:?} with marker {:?}", frame.id, frame.status, frame.marker),
                });
            }
        }
        Ok(())
    }
}

/// A destroyed frame holds no open port.
pub struct DestroyedFrameHasNoPort;

impl Invariant for DestroyedFrameHasNoPort {
    fn name(&self) -> &'static str {
        "destroyed_frame_has_no_port"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.frames.iter().find(|f| f.status == FrameStatus::Destroyed && f.port_open) {
            Some(frame) => Err(Violation {
                invariant: self.name(),
                message: format!("frame {}: destroyed with port open", frame.id),
            }),
            None => Ok(()),
        }
    }
}
