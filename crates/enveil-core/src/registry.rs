//! Controller registry.
//!
//! Maps controller ids to live controller instances, with a reverse index
//! from port name to id so a disconnecting port can be cleaned up in O(1).
//! The registry is an explicit service: whoever needs a lookup is handed a
//! reference to it.
//!
//! Controllers must be explicitly inserted - no lazy creation. Removing by
//! port drops the controller and both index entries.

use std::{collections::HashMap, fmt};

/// Port name prefix used by content frames.
pub const FRAME_PORT_PREFIX: &str = "frame-";

/// Identifier of a background controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(String);

impl ControllerId {
    /// Wrap a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for the controller serving the port named `port_name`.
    ///
    /// `frame-1a2b` yields `1a2b`; names without a prefix are used as is.
    pub fn from_port_name(port_name: &str) -> Self {
        Self::from_prefixed(port_name)
    }

    /// Strip a `<kind>-` prefix such as `dframe-` or `eframe-`.
    ///
    /// Only the first dash separates the prefix.
    pub fn from_prefixed(prefixed: &str) -> Self {
        match prefixed.split_once('-') {
            Some((_, id)) if !id.is_empty() => Self(id.to_owned()),
            _ => Self(prefixed.to_owned()),
        }
    }

    /// Raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live controllers.
#[derive(Debug)]
pub struct ControllerRegistry<C> {
    /// Controller id → controller
    controllers: HashMap<ControllerId, C>,
    /// Port name → controller id (reverse index)
    ports: HashMap<String, ControllerId>,
}

impl<C> Default for ControllerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ControllerRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { controllers: HashMap::new(), ports: HashMap::new() }
    }

    /// Register a controller owned by `port_name`.
    ///
    /// Returns `false` (and drops nothing) if the id or the port is already
    /// registered.
    pub fn insert(&mut self, id: ControllerId, port_name: &str, controller: C) -> bool {
        if self.controllers.contains_key(&id) || self.ports.contains_key(port_name) {
            return false;
        }

        self.ports.insert(port_name.to_owned(), id.clone());
        self.controllers.insert(id, controller);
        true
    }

    /// Remove a controller by id.
    pub fn remove(&mut self, id: &ControllerId) -> Option<C> {
        let controller = self.controllers.remove(id)?;
        self.ports.retain(|_, owner| owner != id);
        Some(controller)
    }

    /// Remove the controller owned by a disconnected port.
    pub fn remove_by_port(&mut self, port_name: &str) -> Option<(ControllerId, C)> {
        let id = self.ports.remove(port_name)?;
        let controller = self.controllers.remove(&id)?;
        Some((id, controller))
    }

    /// Controller by id. `None` if not registered.
    pub fn get(&self, id: &ControllerId) -> Option<&C> {
        self.controllers.get(id)
    }

    /// Mutable controller by id. `None` if not registered.
    pub fn get_mut(&mut self, id: &ControllerId) -> Option<&mut C> {
        self.controllers.get_mut(id)
    }

    /// Controller id owning a port. `None` if not registered.
    pub fn id_for_port(&self, port_name: &str) -> Option<&ControllerId> {
        self.ports.get(port_name)
    }

    /// Check if a controller is registered.
    pub fn contains(&self, id: &ControllerId) -> bool {
        self.controllers.contains_key(id)
    }

    /// All registered ids.
    pub fn ids(&self) -> impl Iterator<Item = &ControllerId> + '_ {
        self.controllers.keys()
    }

    /// All registered controllers.
    pub fn iter(&self) -> impl Iterator<Item = (&ControllerId, &C)> + '_ {
        self.controllers.iter()
    }

    /// Total number of registered controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Whether no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
