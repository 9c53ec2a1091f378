//! Mail integration controller.
//!
//! Drives one compose workflow at a time: open the editor, encrypt, format,
//! get a send token, send. Reply and forward gestures check for a token
//! first and fetch the source message only once it is known to be usable.
//!
//! # States
//!
//! ```text
//! Idle --open-editor--> Composing --sent / cancelled--> Idle
//! Idle --reply/forward, no token--> AwaitingAuth --authorized--> Composing
//! Composing --no send token--> AwaitingAuth --authorized--> Composing
//! AwaitingAuth --authorization failed--> Idle (pending action discarded)
//! ```
//!
//! The editor session and the pending action are single-owner slots. Every
//! asynchronous step carries an [`OpId`]; completions for anything but the
//! current step are stale and dropped, so an abandoned flow never resumes.

use enveil_core::{
    AccessToken, ComposeRequest, ControllerId, EditorOutput, Message, ScopeSet,
    address::same_address, events,
};

use crate::{
    compose,
    error::{AuthError, EditorError, TransportError},
    event::{
        ControllerAction, ControllerEvent, EncryptOutput, Notification, OpId, OutgoingMail, SendReceipt,
        SourceMessage,
    },
    format::{MailDraft, MailFormatter},
    sub::SubController,
};

/// Notification shown after a successful send.
pub const SENT_MESSAGE: &str = "Your encrypted message was sent.";

/// Workflow state of a [`MailController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No editor session, nothing pending.
    Idle,
    /// An editor session exists.
    Composing,
    /// Waiting for the user to authorize; a pending action is held.
    AwaitingAuth,
}

/// User intent captured while authorization is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Encrypted reply to a message.
    Reply {
        /// Message replied to.
        message_id: String,
        /// Reply to all recipients.
        include_all: bool,
        /// Replying account.
        account: String,
    },
    /// Encrypted forward of a message.
    Forward {
        /// Message forwarded.
        message_id: String,
        /// Forwarding account.
        account: String,
    },
    /// Formatted message in the open session waiting for a send token.
    Send {
        /// Sending account.
        account: String,
    },
}

impl PendingAction {
    /// Account the authorization is for.
    pub fn account(&self) -> &str {
        match self {
            Self::Reply { account, .. } | Self::Forward { account, .. } | Self::Send { account } => account,
        }
    }

    /// Scopes the action needs.
    pub fn scopes(&self) -> ScopeSet {
        match self {
            Self::Reply { .. } | Self::Forward { .. } => ScopeSet::read_and_send(),
            Self::Send { .. } => ScopeSet::send(),
        }
    }
}

/// Where the finished ciphertext goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent through the provider's mail API.
    Transport,
    /// Written back into the host page compose element.
    HostPage,
}

/// The editor session slot.
#[derive(Debug, Clone)]
struct EditorSession {
    request: ComposeRequest,
    delivery: Delivery,
    /// Kept after a failed send so a retry does not re-encrypt.
    formatted: Option<OutgoingMail>,
}

/// The asynchronous step currently outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Idle,
    CheckingToken { op: OpId, intent: PendingAction },
    Fetching { op: OpId, intent: PendingAction },
    Encrypting { op: OpId },
    AwaitingSendToken { op: OpId },
    Sending { op: OpId },
}

/// Mail provider controller.
pub struct MailController<F> {
    base: SubController<MailController<F>>,
    formatter: F,
    state: ControllerState,
    session: Option<EditorSession>,
    pending: Option<PendingAction>,
    /// Id of the authorization prompt the pending action waits on.
    prompt: Option<OpId>,
    step: Step,
    next_op: u64,
    recipients_request: Option<u64>,
    /// Set once a message was sent; later sessions stop indenting quotes.
    editor_content_modified: bool,
    /// Encrypted attachment names routed here, by message id.
    encrypted_attachments: Vec<(String, Vec<String>)>,
}

impl<F: MailFormatter> MailController<F> {
    /// Controller answering on `port_name`.
    pub fn new(port_name: &str, formatter: F) -> Self {
        let mut base: SubController<Self> = SubController::for_port(port_name);
        base.on(events::DISPLAY_EDITOR, Self::on_display_editor)
            .on(events::OPEN_EDITOR, Self::on_open_editor)
            .on(events::SECURE_REPLY, Self::on_secure_reply)
            .on(events::SECURE_FORWARD, Self::on_secure_forward)
            .on(events::RECIPIENTS, Self::on_recipients)
            .on(events::UNAUTHORIZE, Self::on_unauthorize)
            .on(events::SET_ENCRYPTED_ATTACHMENTS, Self::on_set_encrypted_attachments);

        Self {
            base,
            formatter,
            state: ControllerState::Idle,
            session: None,
            pending: None,
            prompt: None,
            step: Step::Idle,
            next_op: 0,
            recipients_request: None,
            editor_content_modified: false,
            encrypted_attachments: Vec::new(),
        }
    }

    /// Controller id.
    pub fn id(&self) -> &ControllerId {
        self.base.id()
    }

    /// Port the controller answers on.
    pub fn port_name(&self) -> &str {
        self.base.port_name()
    }

    /// Workflow state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether an editor session exists.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Delivery mode of the current session.
    pub fn delivery(&self) -> Option<Delivery> {
        self.session.as_ref().map(|s| s.delivery)
    }

    /// Captured intent, if any.
    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Whether a formatted message is retained for retry.
    pub fn has_formatted_mail(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.formatted.is_some())
    }

    /// Whether a send already went through on this controller.
    pub fn editor_content_modified(&self) -> bool {
        self.editor_content_modified
    }

    /// Attachment names routed to this controller for `message_id`.
    pub fn encrypted_attachments(&self, message_id: &str) -> Option<&[String]> {
        self.encrypted_attachments
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, names)| names.as_slice())
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: ControllerEvent) -> Vec<ControllerAction> {
        match event {
            ControllerEvent::Inbound(message) => self.handle_message(message),
            ControllerEvent::EncryptCompleted { op, result } => self.on_encrypt_completed(op, result),
            ControllerEvent::TokenResolved { op, token } => self.on_token_resolved(op, token),
            ControllerEvent::SourceFetched { op, result } => self.on_source_fetched(op, result),
            ControllerEvent::MessageSent { op, result } => self.on_message_sent(op, result),
            ControllerEvent::Authorized { op, account, scopes } => self.on_authorized(op, &account, &scopes),
            ControllerEvent::AuthorizationFailed { op, account, error } => {
                self.on_authorization_failed(op, &account, &error)
            },
            ControllerEvent::RecipientsRequested => self.request_recipients(),
            ControllerEvent::EditorDismissed => self.on_editor_dismissed(),
            ControllerEvent::Retry => self.retry(),
            ControllerEvent::PortDisconnected => self.on_port_disconnected(),
        }
    }

    fn handle_message(&mut self, message: Message) -> Vec<ControllerAction> {
        match self.base.handler_for(&message) {
            Ok(handler) => handler(self, message),
            Err(err) => {
                tracing::debug!(controller = %self.id(), %err, "ignoring message");
                Vec::new()
            },
        }
    }

    /// Open the editor for `request`, or bring the existing session forward.
    ///
    /// Starting a new session drops any intent still waiting for
    /// authorization: the newest gesture wins.
    pub fn open_editor(&mut self, mut request: ComposeRequest) -> Vec<ControllerAction> {
        if self.session.is_some() {
            tracing::debug!(controller = %self.id(), "editor already open, activating");
            return vec![ControllerAction::ActivateEditor];
        }

        if let Some(pending) = self.clear_pending() {
            tracing::debug!(controller = %self.id(), ?pending, "pending action pre-empted by new editor");
        }

        let delivery = match (&request.account, request.integration) {
            (Some(_), true) => Delivery::Transport,
            _ => Delivery::HostPage,
        };
        request.quoted_mail_indent = !self.editor_content_modified;

        let op = self.next_op();
        self.session = Some(EditorSession { request: request.clone(), delivery, formatted: None });
        self.step = Step::Encrypting { op };
        self.state = ControllerState::Composing;

        tracing::debug!(controller = %self.id(), %op, ?delivery, "editor session opened");
        vec![ControllerAction::Encrypt { op, request }]
    }

    /// Start an encrypted reply.
    pub fn secure_reply(&mut self, message_id: String, include_all: bool, account: String) -> Vec<ControllerAction> {
        self.begin_derived(PendingAction::Reply { message_id, include_all, account })
    }

    /// Start an encrypted forward.
    pub fn secure_forward(&mut self, message_id: String, account: String) -> Vec<ControllerAction> {
        self.begin_derived(PendingAction::Forward { message_id, account })
    }

    /// Send the retained message again, or re-encrypt when nothing was
    /// formatted yet. Does nothing while a step is outstanding.
    pub fn retry(&mut self) -> Vec<ControllerAction> {
        if self.step != Step::Idle || self.state != ControllerState::Composing {
            return Vec::new();
        }
        let Some(session) = &self.session else {
            return Vec::new();
        };

        if session.formatted.is_some() {
            let account = session.request.account.clone().unwrap_or_default();
            return self.request_send_token(account);
        }

        let request = session.request.clone();
        let op = self.next_op();
        self.step = Step::Encrypting { op };
        tracing::debug!(controller = %self.id(), %op, "re-encrypting");
        vec![ControllerAction::Encrypt { op, request }]
    }

    /// Ask the frame for its recipients on behalf of the editor.
    pub fn request_recipients(&mut self) -> Vec<ControllerAction> {
        let request_id = self.next_op().0;
        self.recipients_request = Some(request_id);
        vec![ControllerAction::Emit(Message::GetRecipients { request_id })]
    }

    fn begin_derived(&mut self, intent: PendingAction) -> Vec<ControllerAction> {
        if self.session.is_some() {
            tracing::debug!(controller = %self.id(), "editor already open, activating");
            return vec![ControllerAction::ActivateEditor];
        }

        if self.state == ControllerState::AwaitingAuth {
            let account_changed = self.pending.as_ref().is_none_or(|p| !same_address(p.account(), intent.account()));
            tracing::debug!(controller = %self.id(), ?intent, "replacing pending action");
            if account_changed {
                return self.await_authorization(intent);
            }
            self.pending = Some(intent);
            return Vec::new();
        }

        let op = self.next_op();
        let action = ControllerAction::RequestToken {
            op,
            account: intent.account().to_owned(),
            scopes: intent.scopes(),
        };
        self.step = Step::CheckingToken { op, intent };
        vec![action]
    }

    fn on_encrypt_completed(&mut self, op: OpId, result: Result<EncryptOutput, EditorError>) -> Vec<ControllerAction> {
        if self.step != (Step::Encrypting { op }) {
            tracing::debug!(controller = %self.id(), %op, "stale encrypt result");
            return Vec::new();
        }
        self.step = Step::Idle;

        let output = match result {
            Ok(output) => output,
            Err(EditorError::Cancelled) => {
                tracing::debug!(controller = %self.id(), "editor cancelled");
                return self.close_session();
            },
            Err(err) => {
                tracing::warn!(controller = %self.id(), %err, "encrypt failed");
                return vec![ControllerAction::Notify(Notification::error(err.to_string()))];
            },
        };

        let Some(session) = &mut self.session else {
            return Vec::new();
        };

        if session.delivery == Delivery::HostPage {
            let output = EditorOutput { text: output.armored, to: output.to, cc: output.cc };
            let mut actions = vec![ControllerAction::Emit(Message::SetEditorOutput(output))];
            actions.extend(self.release_session());
            return actions;
        }

        let account = session.request.account.clone().unwrap_or_default();
        let draft = MailDraft {
            sender: &account,
            to: &output.to,
            cc: &output.cc,
            subject: &output.subject,
            armored: &output.armored,
            attachments: &output.attachments,
            thread_id: session.request.thread_id.as_deref(),
        };

        match self.formatter.format(&draft) {
            Ok(mail) => {
                session.formatted = Some(mail);
                self.request_send_token(account)
            },
            Err(err) => {
                tracing::warn!(controller = %self.id(), %err, "formatting failed");
                vec![ControllerAction::Notify(Notification::error(err.user_message()))]
            },
        }
    }

    fn request_send_token(&mut self, account: String) -> Vec<ControllerAction> {
        let op = self.next_op();
        self.step = Step::AwaitingSendToken { op };
        vec![ControllerAction::RequestToken { op, account, scopes: ScopeSet::send() }]
    }

    fn on_token_resolved(&mut self, op: OpId, token: Option<AccessToken>) -> Vec<ControllerAction> {
        match std::mem::replace(&mut self.step, Step::Idle) {
            Step::CheckingToken { op: current, intent } if current == op => match token {
                Some(_) => self.fetch_source(intent),
                None => self.await_authorization(intent),
            },
            Step::AwaitingSendToken { op: current } if current == op => {
                let Some(session) = &self.session else {
                    return Vec::new();
                };
                let account = session.request.account.clone().unwrap_or_default();
                match (token, session.formatted.clone()) {
                    (Some(token), Some(mail)) => {
                        let op = self.next_op();
                        self.step = Step::Sending { op };
                        vec![ControllerAction::SendMessage { op, mail, token }]
                    },
                    (None, Some(_)) => self.await_authorization(PendingAction::Send { account }),
                    (_, None) => Vec::new(),
                }
            },
            other => {
                tracing::debug!(controller = %self.id(), %op, "stale token result");
                self.step = other;
                Vec::new()
            },
        }
    }

    fn fetch_source(&mut self, intent: PendingAction) -> Vec<ControllerAction> {
        let (account, message_id) = match &intent {
            PendingAction::Reply { account, message_id, .. } | PendingAction::Forward { account, message_id } => {
                (account.clone(), message_id.clone())
            },
            PendingAction::Send { .. } => return Vec::new(),
        };

        let op = self.next_op();
        self.step = Step::Fetching { op, intent };
        vec![ControllerAction::FetchSource { op, account, message_id }]
    }

    /// Hold `intent` and prompt for its account. An earlier prompt's outcome
    /// is stale from here on.
    fn await_authorization(&mut self, intent: PendingAction) -> Vec<ControllerAction> {
        let op = self.next_op();
        let action = ControllerAction::OpenAuthorizeDialog {
            op,
            account: intent.account().to_owned(),
            scopes: intent.scopes(),
        };
        tracing::debug!(controller = %self.id(), %op, ?intent, "authorization required");
        self.pending = Some(intent);
        self.prompt = Some(op);
        self.state = ControllerState::AwaitingAuth;
        vec![action]
    }

    fn on_source_fetched(&mut self, op: OpId, result: Result<SourceMessage, TransportError>) -> Vec<ControllerAction> {
        let intent = match std::mem::replace(&mut self.step, Step::Idle) {
            Step::Fetching { op: current, intent } if current == op => intent,
            other => {
                tracing::debug!(controller = %self.id(), %op, "stale fetch result");
                self.step = other;
                return Vec::new();
            },
        };

        let source = match result {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(controller = %self.id(), %err, "fetching source message failed");
                return Vec::new();
            },
        };

        let request = match &intent {
            PendingAction::Reply { include_all, account, .. } => {
                compose::reply_request(&source, account, *include_all)
            },
            PendingAction::Forward { account, .. } => compose::forward_request(&source, account),
            PendingAction::Send { .. } => return Vec::new(),
        };
        self.open_editor(request)
    }

    fn on_message_sent(&mut self, op: OpId, result: Result<SendReceipt, TransportError>) -> Vec<ControllerAction> {
        if self.step != (Step::Sending { op }) {
            tracing::debug!(controller = %self.id(), %op, "stale send result");
            return Vec::new();
        }
        self.step = Step::Idle;

        match result {
            Ok(receipt) => {
                tracing::info!(controller = %self.id(), message_id = %receipt.message_id, "message sent");
                self.editor_content_modified = true;
                let mut actions = vec![ControllerAction::Notify(Notification::success(SENT_MESSAGE))];
                actions.extend(self.close_session());
                actions
            },
            Err(err) => {
                tracing::warn!(controller = %self.id(), %err, transient = err.is_transient(), "send failed");
                vec![ControllerAction::Notify(Notification::error(err.user_message()))]
            },
        }
    }

    fn on_authorized(&mut self, op: OpId, account: &str, scopes: &ScopeSet) -> Vec<ControllerAction> {
        if self.state != ControllerState::AwaitingAuth || self.prompt != Some(op) {
            tracing::debug!(controller = %self.id(), %op, account, "stale authorization");
            return Vec::new();
        }
        if !self.pending.as_ref().is_some_and(|p| same_address(p.account(), account)) {
            tracing::debug!(controller = %self.id(), account, "authorization for another account");
            return Vec::new();
        }
        let Some(pending) = self.clear_pending() else {
            return Vec::new();
        };
        if !scopes.covers(&pending.scopes()) {
            tracing::debug!(controller = %self.id(), account, "granted scopes narrower than requested");
        }

        self.state =
            if self.session.is_some() { ControllerState::Composing } else { ControllerState::Idle };
        tracing::debug!(controller = %self.id(), ?pending, "resuming after authorization");

        match pending {
            PendingAction::Reply { message_id, include_all, account } => {
                self.secure_reply(message_id, include_all, account)
            },
            PendingAction::Forward { message_id, account } => self.secure_forward(message_id, account),
            PendingAction::Send { account } => self.request_send_token(account),
        }
    }

    fn on_authorization_failed(&mut self, op: OpId, account: &str, error: &AuthError) -> Vec<ControllerAction> {
        if self.state != ControllerState::AwaitingAuth || self.prompt != Some(op) {
            tracing::debug!(controller = %self.id(), %op, account, "stale authorization failure");
            return Vec::new();
        }

        let pending = self.clear_pending();
        tracing::warn!(controller = %self.id(), account, %error, ?pending, "authorization failed");

        if matches!(pending, Some(PendingAction::Send { .. })) {
            return self.close_session();
        }
        self.state = ControllerState::Idle;
        Vec::new()
    }

    fn on_editor_dismissed(&mut self) -> Vec<ControllerAction> {
        if self.session.is_none() {
            return Vec::new();
        }
        tracing::debug!(controller = %self.id(), "editor dismissed");
        self.clear_pending();
        self.step = Step::Idle;
        self.close_session()
    }

    fn on_port_disconnected(&mut self) -> Vec<ControllerAction> {
        tracing::debug!(controller = %self.id(), "port disconnected");
        self.clear_pending();
        self.step = Step::Idle;
        self.recipients_request = None;
        self.state = ControllerState::Idle;
        if self.session.take().is_some() { vec![ControllerAction::ReleaseEditor] } else { Vec::new() }
    }

    /// Release the session and tell the frame it ended.
    fn close_session(&mut self) -> Vec<ControllerAction> {
        let mut actions = self.release_session();
        actions.push(ControllerAction::Emit(Message::EditorSessionClosed));
        actions
    }

    fn release_session(&mut self) -> Vec<ControllerAction> {
        self.state = ControllerState::Idle;
        self.clear_pending();
        if self.session.take().is_some() { vec![ControllerAction::ReleaseEditor] } else { Vec::new() }
    }

    fn clear_pending(&mut self) -> Option<PendingAction> {
        self.prompt = None;
        self.pending.take()
    }

    fn next_op(&mut self) -> OpId {
        self.next_op += 1;
        OpId(self.next_op)
    }

    fn on_display_editor(&mut self, message: Message) -> Vec<ControllerAction> {
        match message {
            Message::DisplayEditor(request) => self.open_editor(request),
            _ => Vec::new(),
        }
    }

    fn on_open_editor(&mut self, message: Message) -> Vec<ControllerAction> {
        match message {
            Message::OpenEditor(request) => self.open_editor(request),
            _ => Vec::new(),
        }
    }

    fn on_secure_reply(&mut self, message: Message) -> Vec<ControllerAction> {
        match message {
            Message::SecureReply { message_id, include_all, account } => {
                self.secure_reply(message_id, include_all, account)
            },
            _ => Vec::new(),
        }
    }

    fn on_secure_forward(&mut self, message: Message) -> Vec<ControllerAction> {
        match message {
            Message::SecureForward { message_id, account } => self.secure_forward(message_id, account),
            _ => Vec::new(),
        }
    }

    fn on_recipients(&mut self, message: Message) -> Vec<ControllerAction> {
        let Message::Recipients { request_id, recipients } = message else {
            return Vec::new();
        };
        if self.recipients_request != Some(request_id) {
            tracing::debug!(controller = %self.id(), request_id, "unrequested recipients");
            return Vec::new();
        }
        self.recipients_request = None;
        vec![ControllerAction::ProvideRecipients(recipients)]
    }

    fn on_unauthorize(&mut self, message: Message) -> Vec<ControllerAction> {
        let Message::Unauthorize { account } = message else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        if self.pending.as_ref().is_some_and(|p| same_address(p.account(), &account)) {
            tracing::debug!(controller = %self.id(), "dropping pending action of unauthorized account");
            if self.session.is_some() {
                actions = self.close_session();
            }
            self.clear_pending();
            self.state = ControllerState::Idle;
        }
        actions.push(ControllerAction::RevokeAuthorization { account });
        actions
    }

    fn on_set_encrypted_attachments(&mut self, message: Message) -> Vec<ControllerAction> {
        let Message::SetEncryptedAttachments { controller_id, account, message_id, file_names } = message else {
            return Vec::new();
        };
        let target = ControllerId::from_prefixed(&controller_id);

        if &target == self.id() {
            tracing::debug!(controller = %self.id(), %message_id, files = file_names.len(), "attachments recorded");
            self.encrypted_attachments.retain(|(id, _)| *id != message_id);
            self.encrypted_attachments.push((message_id, file_names));
            return Vec::new();
        }

        vec![ControllerAction::RouteToController {
            controller_id: target,
            message: Message::SetEncryptedAttachments { controller_id, account, message_id, file_names },
        }]
    }
}

impl<F> std::fmt::Debug for MailController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailController")
            .field("base", &self.base)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("pending", &self.pending)
            .field("prompt", &self.prompt)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}
