//! Base every background controller is built on.
//!
//! A [`SubController`] owns the controller's identity, the name of the port it
//! answers on and its handler table. Specialised controllers embed one and
//! register their handlers at construction.

use enveil_core::{ControllerId, DispatchError, Handler, HandlerTable, Message};

use crate::event::ControllerAction;

/// Id, port and dispatch table of a controller of type `A`.
pub struct SubController<A> {
    id: ControllerId,
    port_name: String,
    handlers: HandlerTable<A, Vec<ControllerAction>>,
}

impl<A> SubController<A> {
    /// Controller answering on `port_name`, id derived from the port name.
    pub fn for_port(port_name: &str) -> Self {
        Self::new(ControllerId::from_port_name(port_name), port_name)
    }

    /// Controller with an explicit id.
    pub fn new(id: ControllerId, port_name: impl Into<String>) -> Self {
        Self { id, port_name: port_name.into(), handlers: HandlerTable::new() }
    }

    /// Register `handler` for `event`.
    pub fn on(&mut self, event: &'static str, handler: Handler<A, Vec<ControllerAction>>) -> &mut Self {
        self.handlers.on(event, handler);
        self
    }

    /// Handler registered for `message`.
    ///
    /// The pointer is copied out so the caller can run it with the owning
    /// controller borrowed mutably.
    pub fn handler_for(&self, message: &Message) -> Result<Handler<A, Vec<ControllerAction>>, DispatchError> {
        self.handlers.lookup(message.name())
    }

    /// Whether `event` has a handler.
    pub fn handles(&self, event: &str) -> bool {
        self.handlers.handles(event)
    }

    /// Controller id.
    pub fn id(&self) -> &ControllerId {
        &self.id
    }

    /// Port name.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl<A> std::fmt::Debug for SubController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubController")
            .field("id", &self.id)
            .field("port_name", &self.port_name)
            .field("handlers", &self.handlers)
            .finish()
    }
}
