//! Deterministic simulation harness for enveil.
//!
//! Simulated implementations of the host page, editor, mail provider,
//! authorization prompt and environment. With tokio's clock paused, a run is
//! fully reproducible from its seed.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks what must be true across all execution
//! paths, not specific scenarios. Use [`InvariantRegistry::standard()`] for
//! the frame and controller invariants.
//!
//! # Scenarios
//!
//! The `scenario` module runs whole user stories through the real runtimes;
//! the `enveil-sim` binary runs them from the command line.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_editor;
pub mod sim_env;
pub mod sim_formatter;
pub mod sim_host;
pub mod sim_transport;

pub use invariants::{
    ControllerSnapshot, DestroyedFrameHasNoPort, FrameSnapshot, Invariant, InvariantRegistry, InvariantResult,
    MarkerMatchesStatus, OverlayMatchesStatus, PendingOnlyWhileAwaitingAuth, SingleEditorSession, SystemSnapshot,
    Violation,
};
pub use scenario::{Scenario, ScenarioError, ScenarioReport};
pub use sim_editor::{EditorLog, EditorOutcome, SimEditor, sim_armor};
pub use sim_env::SimEnv;
pub use sim_formatter::SimFormatter;
pub use sim_host::{PageState, SimHost};
pub use sim_transport::{SimAuthorizer, SimTransport};
