//! Explicit event-name to handler tables.
//!
//! Each actor registers its handlers once, at construction, and looks them up
//! by the inbound message's wire name at dispatch time. Handlers are plain
//! function pointers so a lookup copies the pointer out of the table and the
//! actor can then be borrowed mutably to run it.

use std::{collections::HashMap, fmt};

use crate::{Message, error::DispatchError};

/// Handler for one inbound event.
pub type Handler<A, O> = fn(&mut A, Message) -> O;

/// Mapping from event name to handler for actor `A` producing `O`.
pub struct HandlerTable<A, O> {
    handlers: HashMap<&'static str, Handler<A, O>>,
}

impl<A, O> HandlerTable<A, O> {
    /// Empty table.
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register `handler` for `event`, replacing any previous handler.
    pub fn on(&mut self, event: &'static str, handler: Handler<A, O>) -> &mut Self {
        if self.handlers.insert(event, handler).is_some() {
            tracing::debug!(event, "handler replaced");
        }
        self
    }

    /// Handler for `event`.
    pub fn lookup(&self, event: &str) -> Result<Handler<A, O>, DispatchError> {
        self.handlers
            .get(event)
            .copied()
            .ok_or_else(|| DispatchError::Unhandled { event: event.to_owned() })
    }

    /// Look up the handler for `message` and run it against `actor`.
    pub fn dispatch(&self, actor: &mut A, message: Message) -> Result<O, DispatchError> {
        let handler = self.lookup(message.name())?;
        Ok(handler(actor, message))
    }

    /// Whether a handler is registered for `event`.
    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A, O> Default for HandlerTable<A, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, O> fmt::Debug for HandlerTable<A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<_> = self.handlers.keys().collect();
        events.sort();
        f.debug_struct("HandlerTable").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::events;

    #[derive(Default)]
    struct Counter {
        destroyed: u32,
        closed: u32,
    }

    fn on_destroy(counter: &mut Counter, _: Message) -> u32 {
        counter.destroyed += 1;
        counter.destroyed
    }

    fn on_closed(counter: &mut Counter, _: Message) -> u32 {
        counter.closed += 1;
        counter.closed
    }

    #[test]
    fn dispatches_by_wire_name() {
        let mut table = HandlerTable::new();
        table.on(events::DESTROY, on_destroy).on(events::EDITOR_SESSION_CLOSED, on_closed);

        let mut counter = Counter::default();
        assert_eq!(table.dispatch(&mut counter, Message::Destroy), Ok(1));
        assert_eq!(table.dispatch(&mut counter, Message::EditorSessionClosed), Ok(1));
        assert_eq!(table.dispatch(&mut counter, Message::Destroy), Ok(2));
    }

    #[test]
    fn unknown_event_is_unhandled() {
        let table: HandlerTable<Counter, u32> = HandlerTable::new();
        let mut counter = Counter::default();

        assert_eq!(
            table.dispatch(&mut counter, Message::Destroy),
            Err(DispatchError::Unhandled { event: events::DESTROY.to_owned() })
        );
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut table = HandlerTable::new();
        table.on(events::DESTROY, on_destroy);
        table.on(events::DESTROY, on_closed);

        let mut counter = Counter::default();
        let _ = table.dispatch(&mut counter, Message::Destroy);
        assert_eq!((counter.destroyed, counter.closed), (0, 1));
        assert_eq!(table.len(), 1);
    }
}
