//! Frame state machine.
//!
//! A [`Frame`] overlays one host compose element. It is a pure state machine:
//! host page access is synchronous through [`HostPage`], while port traffic and
//! the close timer are returned as [`FrameAction`]s for the runtime.
//!
//! # States
//!
//! ```text
//! Unattached --attach_to--> Attached --close(false)--> Detached
//!                              ^                          |
//!                              +--------reattach----------+
//! any --close(true)--> Destroyed
//! ```
//!
//! Closing is two-phase: [`Frame::begin_close`] hides the overlay and asks for
//! a timer, [`Frame::finalize_close`] releases resources. Tests call
//! [`Frame::close_frame`] to run both at once.

use std::time::Duration;

use enveil_core::{ComposeRequest, EditorOutput, HandlerTable, Message, armor, events};

use crate::{
    FrameAction, FrameError, FrameId,
    host::{BodyFormat, ElementKind, HostPage, OverlayPosition, StatusMarker},
    markup,
};

/// Lifecycle state of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Created, not yet attached to the element.
    Unattached,
    /// Overlay shown, port open.
    Attached,
    /// Overlay hidden but kept; can be reattached.
    Detached,
    /// Terminal. Overlay removed, port disconnected, marker cleared.
    Destroyed,
}

/// Frame tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Keypresses on the compose element without using the overlay before
    /// the frame dismisses itself.
    pub keypress_threshold: u32,
    /// Exit animation length between the two close phases.
    pub close_delay: Duration,
    /// How rich-text bodies are read on activation.
    pub body_format: BodyFormat,
}

impl FrameConfig {
    /// Default keypress threshold.
    pub const DEFAULT_KEYPRESS_THRESHOLD: u32 = 13;
    /// Default exit animation length.
    pub const DEFAULT_CLOSE_DELAY: Duration = Duration::from_millis(300);
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            keypress_threshold: Self::DEFAULT_KEYPRESS_THRESHOLD,
            close_delay: Self::DEFAULT_CLOSE_DELAY,
            body_format: BodyFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortLink {
    /// Never opened.
    Closed,
    Open,
    /// Remote side went away.
    Lost,
    /// We disconnected it.
    Disconnected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Overlay {
    visible: bool,
    active: bool,
}

/// Content-side actor attached to one compose element.
pub struct Frame<H> {
    id: FrameId,
    status: FrameStatus,
    host: H,
    config: FrameConfig,
    handlers: HandlerTable<Frame<H>, Vec<FrameAction>>,
    overlay: Option<Overlay>,
    port: PortLink,
    keypresses: u32,
    watching_keys: bool,
    watching_resize: bool,
    /// `Some(final)` between the two close phases.
    closing: Option<bool>,
}

impl<H: HostPage> Frame<H> {
    /// Unattached frame for `host`.
    pub fn new(id: FrameId, host: H, config: FrameConfig) -> Self {
        let mut handlers: HandlerTable<Self, Vec<FrameAction>> = HandlerTable::new();
        handlers
            .on(events::GET_RECIPIENTS, Self::on_get_recipients)
            .on(events::SET_EDITOR_OUTPUT, Self::on_set_editor_output)
            .on(events::DESTROY, Self::on_destroy)
            .on(events::EDITOR_SESSION_CLOSED, Self::on_editor_session_closed)
            .on(events::MAIL_EDITOR_CLOSE, Self::on_editor_session_closed);

        Self {
            id,
            status: FrameStatus::Unattached,
            host,
            config,
            handlers,
            overlay: None,
            port: PortLink::Closed,
            keypresses: 0,
            watching_keys: false,
            watching_resize: false,
            closing: None,
        }
    }

    /// Frame id.
    pub fn id(&self) -> &FrameId {
        &self.id
    }

    /// Current state.
    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// The host page.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host page, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Configuration in use.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Keypresses counted since the watch was armed.
    pub fn keypresses(&self) -> u32 {
        self.keypresses
    }

    /// Whether the overlay exists in the page.
    pub fn is_overlay_mounted(&self) -> bool {
        self.overlay.is_some()
    }

    /// Whether the overlay is shown.
    pub fn is_overlay_visible(&self) -> bool {
        self.overlay.is_some_and(|o| o.visible)
    }

    /// Whether the overlay shows the active (editor open) state.
    pub fn is_active(&self) -> bool {
        self.overlay.is_some_and(|o| o.active)
    }

    /// Whether a close was begun and not yet finalized.
    pub fn is_closing(&self) -> bool {
        self.closing.is_some()
    }

    /// Whether the port to the controller is open.
    pub fn is_port_open(&self) -> bool {
        self.port == PortLink::Open
    }

    /// Attach to the compose element: mark it, mount and place the overlay,
    /// start watching keypresses and resizes, and open the port.
    pub fn attach_to(&mut self) -> Result<Vec<FrameAction>, FrameError> {
        if self.status != FrameStatus::Unattached {
            return Err(FrameError::InvalidTransition { operation: "attach", status: self.status });
        }

        self.status = FrameStatus::Attached;
        self.host.set_status_marker(Some(StatusMarker::Attached));
        self.port = PortLink::Open;

        let port_name = self.id.port_name();
        self.host.mount_overlay(&port_name);
        self.overlay = Some(Overlay::default());
        self.watching_resize = true;
        self.reposition();
        self.set_visible(true);
        self.watching_keys = true;

        tracing::debug!(frame = %self.id, "attached");
        Ok(vec![FrameAction::OpenPort { name: port_name }])
    }

    /// Route an inbound port message to its handler.
    ///
    /// Messages arriving after the frame was destroyed are dropped.
    pub fn handle_message(&mut self, message: Message) -> Result<Vec<FrameAction>, FrameError> {
        if self.status == FrameStatus::Destroyed {
            tracing::debug!(frame = %self.id, event = message.name(), "dropping message for destroyed frame");
            return Ok(Vec::new());
        }

        let handler = self.handlers.lookup(message.name())?;
        Ok(handler(self, message))
    }

    /// Window resized: keep the overlay next to the element.
    pub fn on_resize(&mut self) {
        if self.watching_resize {
            self.reposition();
        }
    }

    /// A key was pressed in the compose element.
    ///
    /// Reaching the threshold means the user is writing without the overlay:
    /// the watch stops and the frame closes for good.
    pub fn on_keypress(&mut self) -> Vec<FrameAction> {
        if !self.watching_keys {
            return Vec::new();
        }

        self.keypresses += 1;
        if self.keypresses < self.config.keypress_threshold {
            return Vec::new();
        }

        self.watching_keys = false;
        tracing::debug!(frame = %self.id, keypresses = self.keypresses, "overlay ignored, dismissing");
        self.begin_close(true)
    }

    /// The user clicked the overlay: ask the controller for an editor.
    ///
    /// An armored block already in the body is offered as quoted mail. If it
    /// cannot be extracted the whole body goes through as text instead.
    pub fn on_overlay_activated(&mut self) -> Result<Vec<FrameAction>, FrameError> {
        if self.status != FrameStatus::Attached || self.closing.is_some() {
            return Err(FrameError::InvalidTransition { operation: "activate overlay", status: self.status });
        }

        self.watching_keys = false;
        self.set_active(true);

        let body = self.read_body();
        let mut request = ComposeRequest {
            recipients: self.host.recipients(),
            account: self.host.account(),
            integration: self.host.supports_integration(),
            ..ComposeRequest::default()
        };

        if armor::contains_armored(&body) {
            match armor::extract_armored(&body) {
                Ok(quoted) => request.quoted_mail = Some(quoted),
                Err(err) => {
                    tracing::debug!(frame = %self.id, %err, "armored block unusable, passing body as text");
                    request.text = Some(body);
                },
            }
        } else {
            request.text = Some(body);
        }

        Ok(vec![FrameAction::Emit(Message::DisplayEditor(request))])
    }

    /// Write the editor's ciphertext and recipients into the page.
    ///
    /// Rich bodies lose every child node before the escaped text is appended
    /// in a `<pre>`. An `input` event follows so the page's own editor model
    /// picks up the change.
    pub fn set_editor_output(&mut self, output: &EditorOutput) {
        self.set_active(false);
        self.reposition();

        match self.host.element_kind() {
            ElementKind::TextArea => self.host.set_value(&output.text),
            ElementKind::RichText => {
                self.host.clear_children();
                self.host.append_html(&markup::preformatted(&output.text));
            },
        }
        self.host.dispatch_input_event();
        self.host.set_recipients(&output.to, &output.cc);

        tracing::debug!(frame = %self.id, to = output.to.len(), cc = output.cc.len(), "editor output written");
    }

    /// First close phase: hide the overlay and ask for
    /// [`Self::finalize_close`] after the exit animation.
    ///
    /// A final request upgrades a pending non-final one.
    pub fn begin_close(&mut self, final_close: bool) -> Vec<FrameAction> {
        match (self.status, final_close) {
            (FrameStatus::Destroyed, _) | (FrameStatus::Unattached | FrameStatus::Detached, false) => {
                return Vec::new();
            },
            _ => {},
        }

        if let Some(pending) = &mut self.closing {
            *pending |= final_close;
            return Vec::new();
        }

        self.closing = Some(final_close);
        self.watching_keys = false;
        self.set_visible(false);

        tracing::debug!(frame = %self.id, final_close, "closing");
        vec![FrameAction::ScheduleFinalize { delay: self.config.close_delay }]
    }

    /// Second close phase: detach or destroy.
    pub fn finalize_close(&mut self) -> Vec<FrameAction> {
        let Some(final_close) = self.closing.take() else {
            return Vec::new();
        };
        self.watching_resize = false;

        if final_close {
            return self.destroy();
        }

        if self.status == FrameStatus::Attached {
            self.status = FrameStatus::Detached;
            self.host.set_status_marker(Some(StatusMarker::Detached));
            tracing::debug!(frame = %self.id, "detached");
        }
        Vec::new()
    }

    /// Both close phases without waiting.
    pub fn close_frame(&mut self, final_close: bool) -> Vec<FrameAction> {
        let mut actions: Vec<_> = self
            .begin_close(final_close)
            .into_iter()
            .filter(|action| !matches!(action, FrameAction::ScheduleFinalize { .. }))
            .collect();
        actions.extend(self.finalize_close());
        actions
    }

    /// The controller side of the port went away.
    ///
    /// Treated as a non-final close: the frame stays reattachable.
    pub fn on_port_disconnected(&mut self) -> Vec<FrameAction> {
        if self.port == PortLink::Open {
            self.port = PortLink::Lost;
        }
        tracing::debug!(frame = %self.id, "controller disconnected");
        self.begin_close(false)
    }

    /// Show a detached frame again, reopening the port if it was lost.
    pub fn reattach(&mut self) -> Result<Vec<FrameAction>, FrameError> {
        if self.status != FrameStatus::Detached || self.closing.is_some() {
            return Err(FrameError::InvalidTransition { operation: "reattach", status: self.status });
        }

        self.status = FrameStatus::Attached;
        self.host.set_status_marker(Some(StatusMarker::Attached));
        self.watching_resize = true;
        self.reposition();
        self.set_active(false);
        self.set_visible(true);
        self.keypresses = 0;
        self.watching_keys = true;

        let mut actions = Vec::new();
        if self.port != PortLink::Open {
            self.port = PortLink::Open;
            actions.push(FrameAction::OpenPort { name: self.id.port_name() });
        }

        tracing::debug!(frame = %self.id, "reattached");
        Ok(actions)
    }

    fn destroy(&mut self) -> Vec<FrameAction> {
        if self.overlay.take().is_some() {
            self.host.remove_overlay();
        }
        self.status = FrameStatus::Destroyed;
        self.watching_keys = false;
        self.host.set_status_marker(None);

        tracing::debug!(frame = %self.id, "destroyed");
        if self.port == PortLink::Open {
            self.port = PortLink::Disconnected;
            vec![FrameAction::DisconnectPort]
        } else {
            Vec::new()
        }
    }

    fn read_body(&self) -> String {
        match (self.host.element_kind(), self.config.body_format) {
            (ElementKind::TextArea, _) => self.host.value(),
            (ElementKind::RichText, BodyFormat::Text) => self.host.text(),
            (ElementKind::RichText, BodyFormat::Html) => markup::flatten_html(&self.host.html()),
        }
    }

    fn reposition(&mut self) {
        if self.overlay.is_some() {
            let position = OverlayPosition::below(self.host.offset_top());
            self.host.position_overlay(position);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        if let Some(overlay) = &mut self.overlay
            && overlay.visible != visible
        {
            overlay.visible = visible;
            self.host.set_overlay_visible(visible);
        }
    }

    fn set_active(&mut self, active: bool) {
        if let Some(overlay) = &mut self.overlay
            && overlay.active != active
        {
            overlay.active = active;
            self.host.set_overlay_active(active);
        }
    }

    fn on_get_recipients(&mut self, message: Message) -> Vec<FrameAction> {
        let Message::GetRecipients { request_id } = message else {
            return Vec::new();
        };
        let recipients = self.host.recipients();
        vec![FrameAction::Emit(Message::Recipients { request_id, recipients })]
    }

    fn on_set_editor_output(&mut self, message: Message) -> Vec<FrameAction> {
        if let Message::SetEditorOutput(output) = message {
            self.set_editor_output(&output);
        }
        Vec::new()
    }

    fn on_destroy(&mut self, _: Message) -> Vec<FrameAction> {
        self.begin_close(true)
    }

    fn on_editor_session_closed(&mut self, _: Message) -> Vec<FrameAction> {
        self.set_active(false);
        Vec::new()
    }
}
