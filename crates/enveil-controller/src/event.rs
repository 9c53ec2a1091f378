//! Controller events, actions and the data they carry.
//!
//! Every asynchronous request the controller makes carries an [`OpId`]. Its
//! completion event echoes the id back; a completion whose id is no longer
//! current is dropped. That keeps one terminal resolution per compose action
//! and stops an abandoned flow from being resumed.

use std::fmt;

use bytes::Bytes;
use enveil_core::{AccessToken, ComposeRequest, ControllerId, Message, Recipient, ScopeSet};

use crate::error::{AuthError, EditorError, TransportError};

/// Correlates an asynchronous request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// An encrypted attachment produced by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name, `.gpg` suffixed.
    pub name: String,
    /// Armored or binary ciphertext.
    pub data: Bytes,
}

/// What the editor hands back after a successful `encrypt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptOutput {
    /// Armored message body.
    pub armored: String,
    /// Encrypted attachments.
    pub attachments: Vec<Attachment>,
    /// Subject as edited by the user.
    pub subject: String,
    /// Primary recipients as edited by the user.
    pub to: Vec<Recipient>,
    /// Copy recipients as edited by the user.
    pub cc: Vec<Recipient>,
}

/// A formatted message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Sending account.
    pub account: String,
    /// Encoded message.
    pub raw: Bytes,
    /// Thread to file the message into.
    pub thread_id: Option<String>,
}

/// Transport acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider id of the sent message.
    pub message_id: String,
}

/// A fetched message a reply or forward is derived from.
///
/// Address headers are kept raw; parsing degrades to empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMessage {
    /// Provider message id.
    pub message_id: String,
    /// Provider thread id.
    pub thread_id: Option<String>,
    /// `From` header.
    pub from: String,
    /// `To` header.
    pub to: String,
    /// `Cc` header.
    pub cc: String,
    /// `Subject` header.
    pub subject: String,
    /// `Date` header, as displayed.
    pub date: String,
    /// Extracted body.
    pub body: String,
}

/// Severity of an editor notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
}

/// Notification shown on the editor surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub kind: NotificationKind,
    /// Text shown to the user.
    pub message: String,
    /// Hide by itself after a while.
    pub auto_hide: bool,
    /// User can dismiss it.
    pub dismissable: bool,
}

impl Notification {
    /// Dismissable, auto-hiding success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into(), auto_hide: true, dismissable: true }
    }

    /// Error that stays until dismissed.
    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, message: message.into(), auto_hide: false, dismissable: true }
    }
}

/// Inputs of the [`crate::MailController`] state machine.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Message from the controller's port.
    Inbound(Message),

    /// The editor resolved an [`ControllerAction::Encrypt`].
    EncryptCompleted {
        /// Request id.
        op: OpId,
        /// Output, cancellation or failure.
        result: Result<EncryptOutput, EditorError>,
    },

    /// Token lookup finished. `None` means authorization is required.
    TokenResolved {
        /// Request id.
        op: OpId,
        /// Token, if one is cached and valid.
        token: Option<AccessToken>,
    },

    /// Source message fetch finished.
    SourceFetched {
        /// Request id.
        op: OpId,
        /// Message or failure.
        result: Result<SourceMessage, TransportError>,
    },

    /// Send finished.
    MessageSent {
        /// Request id.
        op: OpId,
        /// Receipt or failure.
        result: Result<SendReceipt, TransportError>,
    },

    /// The authorization prompt succeeded.
    Authorized {
        /// Prompt id.
        op: OpId,
        /// Account that was authorized.
        account: String,
        /// Scopes granted.
        scopes: ScopeSet,
    },

    /// The authorization prompt failed or was closed.
    AuthorizationFailed {
        /// Prompt id.
        op: OpId,
        /// Account the prompt was for.
        account: String,
        /// Reason.
        error: AuthError,
    },

    /// The editor asks for the recipients currently in the host page.
    RecipientsRequested,

    /// The user closed the editor while no encrypt call was outstanding.
    EditorDismissed,

    /// The user asked to try the failed send again.
    Retry,

    /// The controller's port disconnected.
    PortDisconnected,
}

/// Side effects requested by the [`crate::MailController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerAction {
    /// Acquire an editor session and run `encrypt`; answer with
    /// [`ControllerEvent::EncryptCompleted`].
    Encrypt {
        /// Request id.
        op: OpId,
        /// What to prefill.
        request: ComposeRequest,
    },

    /// Bring the existing editor session to the foreground.
    ActivateEditor,

    /// Drop the editor session.
    ReleaseEditor,

    /// Show a notification on the editor surface.
    Notify(Notification),

    /// Look up a token; answer with [`ControllerEvent::TokenResolved`].
    RequestToken {
        /// Request id.
        op: OpId,
        /// Account.
        account: String,
        /// Required scopes.
        scopes: ScopeSet,
    },

    /// Prompt the user to authorize; answer with
    /// [`ControllerEvent::Authorized`] or
    /// [`ControllerEvent::AuthorizationFailed`].
    OpenAuthorizeDialog {
        /// Prompt id. Only the latest prompt's outcome is acted on.
        op: OpId,
        /// Account.
        account: String,
        /// Scopes to request.
        scopes: ScopeSet,
    },

    /// Fetch a message; answer with [`ControllerEvent::SourceFetched`].
    FetchSource {
        /// Request id.
        op: OpId,
        /// Account owning the message.
        account: String,
        /// Provider message id.
        message_id: String,
    },

    /// Send through the transport; answer with
    /// [`ControllerEvent::MessageSent`].
    SendMessage {
        /// Request id.
        op: OpId,
        /// Formatted message.
        mail: OutgoingMail,
        /// Send-scoped token.
        token: AccessToken,
    },

    /// Forget stored authorization for an account.
    RevokeAuthorization {
        /// Account.
        account: String,
    },

    /// Send a message over the controller's port.
    Emit(Message),

    /// Hand host page recipients to the editor.
    ProvideRecipients(Vec<Recipient>),

    /// Deliver `message` to another registered controller.
    RouteToController {
        /// Target controller.
        controller_id: ControllerId,
        /// Message to deliver.
        message: Message,
    },
}
