//! Content-side runtime.
//!
//! Drives one [`Frame`]: host page events come in over a channel, port
//! traffic through the frame's [`PortSender`]/[`PortReceiver`], and the
//! close timer through the [`Environment`] so simulation can pause time.

use std::{future::Future, pin::Pin};

use enveil_core::{Inbound, PortHub, PortReceiver, PortSender, env::Environment};
use enveil_frame::{Frame, FrameAction, FrameStatus, HostPage};
use tokio::sync::mpsc;

use crate::RuntimeError;

/// Page events the content script observes on the compose element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A key was pressed in the compose element.
    Keypress,
    /// The window was resized.
    Resize,
    /// The user clicked the overlay.
    OverlayActivated,
    /// The compose element became visible again after a non-final close.
    Reattach,
    /// The page asks the frame to close.
    Close {
        /// Destroy instead of detach.
        final_close: bool,
    },
}

type Timer = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Runtime for a single frame.
pub struct FrameRuntime<H, E> {
    frame: Frame<H>,
    hub: PortHub,
    env: E,
    sender: Option<PortSender>,
    receiver: Option<PortReceiver>,
    finalize: Option<Timer>,
}

impl<H: HostPage, E: Environment> FrameRuntime<H, E> {
    /// Runtime for `frame`, connecting its port through `hub`.
    pub fn new(frame: Frame<H>, hub: PortHub, env: E) -> Self {
        Self { frame, hub, env, sender: None, receiver: None, finalize: None }
    }

    /// The frame being driven.
    pub fn frame(&self) -> &Frame<H> {
        &self.frame
    }

    /// Attach the frame and run until it is destroyed.
    ///
    /// Closing the host event channel counts as the element going away and
    /// destroys the frame. Returns the destroyed frame.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the frame cannot attach or its port
    /// cannot be opened.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) -> Result<Frame<H>, RuntimeError> {
        let actions = self.frame.attach_to()?;
        self.execute(actions)?;

        let mut host_open = true;
        while self.frame.status() != FrameStatus::Destroyed {
            tokio::select! {
                event = events.recv(), if host_open => match event {
                    Some(event) => self.on_host_event(event)?,
                    None => {
                        tracing::debug!(frame = %self.frame.id(), "host element gone");
                        host_open = false;
                        let actions = self.frame.close_frame(true);
                        self.execute(actions)?;
                    },
                },

                inbound = next_inbound(&mut self.receiver) => self.on_inbound(inbound)?,

                () = fire(&mut self.finalize) => {
                    self.finalize = None;
                    let actions = self.frame.finalize_close();
                    self.execute(actions)?;
                },
            }
        }

        Ok(self.frame)
    }

    fn on_host_event(&mut self, event: HostEvent) -> Result<(), RuntimeError> {
        let actions = match event {
            HostEvent::Keypress => self.frame.on_keypress(),
            HostEvent::Resize => {
                self.frame.on_resize();
                Vec::new()
            },
            HostEvent::OverlayActivated => self.frame.on_overlay_activated().unwrap_or_else(|err| {
                tracing::debug!(frame = %self.frame.id(), %err, "activation ignored");
                Vec::new()
            }),
            HostEvent::Reattach => self.frame.reattach().unwrap_or_else(|err| {
                tracing::debug!(frame = %self.frame.id(), %err, "reattach ignored");
                Vec::new()
            }),
            HostEvent::Close { final_close } => self.frame.begin_close(final_close),
        };
        self.execute(actions)
    }

    fn on_inbound(&mut self, inbound: Option<Inbound>) -> Result<(), RuntimeError> {
        let actions = match inbound {
            Some(Inbound::Message(message)) => match self.frame.handle_message(message) {
                Ok(actions) => actions,
                Err(err) => {
                    tracing::debug!(frame = %self.frame.id(), %err, "ignoring message");
                    return Ok(());
                },
            },
            Some(Inbound::Disconnected) => {
                // Both halves go so the port name is released for a reattach.
                self.sender = None;
                self.receiver = None;
                self.frame.on_port_disconnected()
            },
            None => {
                self.receiver = None;
                return Ok(());
            },
        };
        self.execute(actions)
    }

    fn execute(&mut self, actions: Vec<FrameAction>) -> Result<(), RuntimeError> {
        for action in actions {
            match action {
                FrameAction::OpenPort { name } => {
                    let (sender, receiver) = self.hub.connect(&name)?.split();
                    self.sender = Some(sender);
                    self.receiver = Some(receiver);
                },
                FrameAction::Emit(message) => match &self.sender {
                    Some(sender) => {
                        if let Err(err) = sender.emit(&message) {
                            tracing::warn!(frame = %self.frame.id(), event = message.name(), %err, "emit failed");
                        }
                    },
                    None => tracing::warn!(frame = %self.frame.id(), event = message.name(), "no port"),
                },
                FrameAction::ScheduleFinalize { delay } => {
                    let env = self.env.clone();
                    self.finalize = Some(Box::pin(async move { env.sleep(delay).await }));
                },
                FrameAction::DisconnectPort => {
                    if let Some(sender) = self.sender.take() {
                        sender.disconnect();
                    }
                    self.receiver = None;
                },
            }
        }
        Ok(())
    }
}

async fn next_inbound(receiver: &mut Option<PortReceiver>) -> Option<Inbound> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn fire(timer: &mut Option<Timer>) {
    match timer {
        Some(timer) => timer.await,
        None => std::future::pending().await,
    }
}
