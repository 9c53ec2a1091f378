//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after every processed event, not
//! just at the end of a scenario.
//!
//! # Architecture
//!
//! Observable state of frames, controllers and the editor is captured into a
//! [`SystemSnapshot`]; registered [`Invariant`]s run against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::default().with_frame(FrameSnapshot::of(&frame));
//! registry.assert_all(&snapshot, "after keypress");
//! ```

mod checks;
mod snapshot;

pub use checks::{
    DestroyedFrameHasNoPort, MarkerMatchesStatus, OverlayMatchesStatus, PendingOnlyWhileAwaitingAuth,
    SingleEditorSession,
};
pub use snapshot::{ControllerSnapshot, FrameSnapshot, SystemSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// What went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant.
    ///
    /// # Errors
    ///
    /// Returns a [`Violation`] describing the first offending frame or
    /// controller.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every standard invariant.
    ///
    /// - [`SingleEditorSession`]: session slot agrees with the state, one
    ///   encrypt call at a time
    /// - [`PendingOnlyWhileAwaitingAuth`]: pending action iff `AwaitingAuth`
    /// - [`OverlayMatchesStatus`]: one overlay while attached or detached
    /// - [`MarkerMatchesStatus`]: status attribute mirrors the frame status
    /// - [`DestroyedFrameHasNoPort`]: destroyed frames hold no port
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SingleEditorSession);
        registry.add(PendingOnlyWhileAwaitingAuth);
        registry.add(OverlayMatchesStatus);
        registry.add(MarkerMatchesStatus);
        registry.add(DestroyedFrameHasNoPort);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> = self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        assert_eq!(InvariantRegistry::standard().len(), 5);
    }

    #[test]
    fn empty_snapshot_passes() {
        assert!(InvariantRegistry::standard().check_all(&SystemSnapshot::default()).is_ok());
    }
}
