//! Background runtime.
//!
//! Owns one [`MailController`] per connected frame port and executes their
//! actions. Every collaborator call runs as its own future; completions come
//! back as [`ControllerEvent`]s addressed to the controller that asked.
//!
//! # Event sources
//!
//! - [`PortAcceptor`]: new frame ports, each gets a controller
//! - port forwarders: one task per port relays [`Inbound`] items in FIFO order
//! - collaborator completions ([`FuturesUnordered`])
//! - [`BackgroundHandle`]: editor UI events (dismiss, retry, recipients)
//!
//! The loop ends once the acceptor is closed, every port has disconnected and
//! no collaborator call is outstanding.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
};

use enveil_controller::{ControllerAction, ControllerEvent, MailController, MailFormatter};
use enveil_core::{ControllerId, ControllerRegistry, Inbound, Port, PortAcceptor, PortSender};
use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use tokio::sync::mpsc;

use crate::{
    RuntimeConfig,
    driver::{Authorizer, EditorBackend, MailTransport},
};

type Completion = BoxFuture<'static, Option<(ControllerId, ControllerEvent)>>;

/// Feeds editor UI events into a running [`Background`].
#[derive(Debug, Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<(ControllerId, ControllerEvent)>,
}

impl BackgroundHandle {
    /// Deliver `event` to `controller`. Returns `false` once the runtime is
    /// gone.
    pub async fn send(&self, controller: ControllerId, event: ControllerEvent) -> bool {
        self.tx.send((controller, event)).await.is_ok()
    }
}

/// Controller-side runtime.
pub struct Background<F, Ed, T, Au> {
    config: RuntimeConfig,
    formatter: F,
    editor: Ed,
    transport: T,
    authorizer: Au,
    registry: ControllerRegistry<MailController<F>>,
    ports: HashMap<ControllerId, PortSender>,
    inbound_tx: mpsc::Sender<(String, Inbound)>,
    inbound_rx: mpsc::Receiver<(String, Inbound)>,
    commands: mpsc::Receiver<(ControllerId, ControllerEvent)>,
    completions: FuturesUnordered<Completion>,
}

impl<F, Ed, T, Au> Background<F, Ed, T, Au>
where
    F: MailFormatter + Clone,
    Ed: EditorBackend,
    T: MailTransport,
    Au: Authorizer,
{
    /// Runtime with the given collaborators. New controllers get a clone of
    /// `formatter`.
    pub fn new(config: RuntimeConfig, formatter: F, editor: Ed, transport: T, authorizer: Au) -> (Self, BackgroundHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity);
        let (command_tx, commands) = mpsc::channel(config.channel_capacity);

        let background = Self {
            config,
            formatter,
            editor,
            transport,
            authorizer,
            registry: ControllerRegistry::new(),
            ports: HashMap::new(),
            inbound_tx,
            inbound_rx,
            commands,
            completions: FuturesUnordered::new(),
        };
        (background, BackgroundHandle { tx: command_tx })
    }

    /// Live controllers.
    pub fn registry(&self) -> &ControllerRegistry<MailController<F>> {
        &self.registry
    }

    /// Run until the acceptor closes and every port is gone. Returns the
    /// runtime for inspection.
    pub async fn run(mut self, mut acceptor: PortAcceptor) -> Self {
        let mut accepting = true;
        let mut commands_open = true;

        loop {
            if !accepting && self.registry.is_empty() && self.completions.is_empty() {
                break;
            }

            tokio::select! {
                accepted = acceptor.accept(), if accepting => match accepted {
                    Some(port) => self.attach(port),
                    None => {
                        tracing::debug!("port hub closed");
                        accepting = false;
                    },
                },

                Some((port_name, inbound)) = self.inbound_rx.recv() => {
                    self.on_inbound(&port_name, inbound);
                },

                Some(completion) = self.completions.next(), if !self.completions.is_empty() => {
                    if let Some((id, event)) = completion {
                        self.dispatch(id, event);
                    }
                },

                command = self.commands.recv(), if commands_open => match command {
                    Some((id, event)) => self.dispatch(id, event),
                    None => commands_open = false,
                },
            }
        }

        tracing::debug!("background runtime stopped");
        self
    }

    /// Register a controller for `port` and start relaying its messages.
    fn attach(&mut self, port: Port) {
        let name = port.name().to_owned();
        let id = ControllerId::from_port_name(&name);
        let controller = MailController::new(&name, self.formatter.clone());

        if !self.registry.insert(id.clone(), &name, controller) {
            tracing::warn!(port = %name, controller = %id, "controller already registered, refusing port");
            port.disconnect();
            return;
        }

        let (sender, mut receiver) = port.split();
        self.ports.insert(id.clone(), sender);

        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(inbound) = receiver.recv().await {
                if tx.send((name.clone(), inbound)).await.is_err() {
                    break;
                }
            }
        });
        tracing::debug!(controller = %id, "controller attached");
    }

    fn on_inbound(&mut self, port_name: &str, inbound: Inbound) {
        let Some(id) = self.registry.id_for_port(port_name).cloned() else {
            tracing::debug!(port = port_name, "inbound for unknown port");
            return;
        };

        match inbound {
            Inbound::Message(message) => self.dispatch(id, ControllerEvent::Inbound(message)),
            Inbound::Disconnected => {
                self.dispatch(id.clone(), ControllerEvent::PortDisconnected);
                self.registry.remove_by_port(port_name);
                self.ports.remove(&id);
                tracing::debug!(controller = %id, "controller removed");
            },
        }
    }

    /// Feed `event` to its controller and execute the resulting actions.
    ///
    /// Routed messages are queued, not recursed into.
    fn dispatch(&mut self, id: ControllerId, event: ControllerEvent) {
        let mut queue = VecDeque::from([(id, event)]);

        while let Some((id, event)) = queue.pop_front() {
            let Some(controller) = self.registry.get_mut(&id) else {
                tracing::debug!(controller = %id, "event for removed controller");
                continue;
            };

            for action in controller.handle(event) {
                if let Some(routed) = self.execute(&id, action) {
                    queue.push_back(routed);
                }
            }
        }
    }

    fn execute(&mut self, id: &ControllerId, action: ControllerAction) -> Option<(ControllerId, ControllerEvent)> {
        match action {
            ControllerAction::Encrypt { op, request } => {
                let editor = self.editor.clone();
                let id = id.clone();
                self.complete(async move {
                    let result = editor.encrypt(&id, request).await;
                    Some((id, ControllerEvent::EncryptCompleted { op, result }))
                });
            },

            ControllerAction::ActivateEditor => self.editor.activate(id),
            ControllerAction::ReleaseEditor => self.editor.release(id),
            ControllerAction::ProvideRecipients(recipients) => self.editor.provide_recipients(id, recipients),

            ControllerAction::Notify(notification) => {
                let hide_after = notification.auto_hide.then_some(self.config.notification_auto_hide);
                self.editor.notify(id, notification, hide_after);
            },

            ControllerAction::RequestToken { op, account, scopes } => {
                let transport = self.transport.clone();
                let id = id.clone();
                self.complete(async move {
                    let token = transport.access_token(&account, &scopes).await;
                    Some((id, ControllerEvent::TokenResolved { op, token }))
                });
            },

            ControllerAction::OpenAuthorizeDialog { op, account, scopes } => {
                let authorizer = self.authorizer.clone();
                let id = id.clone();
                self.complete(async move {
                    let event = match authorizer.authorize(&account, &scopes).await {
                        Ok(()) => ControllerEvent::Authorized { op, account, scopes },
                        Err(error) => ControllerEvent::AuthorizationFailed { op, account, error },
                    };
                    Some((id, event))
                });
            },

            ControllerAction::FetchSource { op, account, message_id } => {
                let transport = self.transport.clone();
                let id = id.clone();
                self.complete(async move {
                    let result = transport.fetch(&account, &message_id).await;
                    Some((id, ControllerEvent::SourceFetched { op, result }))
                });
            },

            ControllerAction::SendMessage { op, mail, token } => {
                let transport = self.transport.clone();
                let id = id.clone();
                self.complete(async move {
                    let result = transport.send(mail, token).await;
                    Some((id, ControllerEvent::MessageSent { op, result }))
                });
            },

            ControllerAction::RevokeAuthorization { account } => {
                let transport = self.transport.clone();
                self.complete(async move {
                    transport.revoke(&account).await;
                    None
                });
            },

            ControllerAction::Emit(message) => match self.ports.get(id) {
                Some(port) => {
                    if let Err(err) = port.emit(&message) {
                        tracing::warn!(controller = %id, event = message.name(), %err, "emit failed");
                    }
                },
                None => tracing::warn!(controller = %id, event = message.name(), "no port for controller"),
            },

            ControllerAction::RouteToController { controller_id, message } => {
                if self.registry.contains(&controller_id) {
                    return Some((controller_id, ControllerEvent::Inbound(message)));
                }
                tracing::warn!(from = %id, to = %controller_id, event = message.name(), "route target not registered");
            },
        }
        None
    }

    fn complete(&mut self, completion: impl Future<Output = Option<(ControllerId, ControllerEvent)>> + Send + 'static) {
        self.completions.push(completion.boxed());
    }
}

impl<F, Ed, T, Au> std::fmt::Debug for Background<F, Ed, T, Au> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Background")
            .field("controllers", &self.registry.len())
            .field("outstanding", &self.completions.len())
            .finish_non_exhaustive()
    }
}
