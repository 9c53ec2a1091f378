//! Background controllers for enveil.
//!
//! # Architecture
//!
//! Controllers follow the sans-IO, action-based pattern: the runtime feeds
//! [`ControllerEvent`]s in (port messages and completions of earlier
//! requests) and executes the [`ControllerAction`]s that come out. Editor,
//! transport and authorization prompt stay behind the runtime.
//!
//! # Components
//!
//! - [`SubController`]: id, port name and handler table shared by controllers
//! - [`MailController`]: compose, reply, forward and send with the
//!   authorization gate
//! - [`compose`]: reply recipients, subjects and quote headers
//! - [`MailFormatter`]: boundary to the message builder
//! - [`recipients::RecipientInput`]: snapshot-driven recipient tag model

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod compose;
mod error;
mod event;
mod format;
mod mail;
pub mod recipients;
mod sub;

pub use error::{AuthError, EditorError, FormatError, TransportError};
pub use event::{
    Attachment, ControllerAction, ControllerEvent, EncryptOutput, Notification, NotificationKind, OpId,
    OutgoingMail, SendReceipt, SourceMessage,
};
pub use format::{MailDraft, MailFormatter};
pub use mail::{ControllerState, Delivery, MailController, PendingAction, SENT_MESSAGE};
pub use sub::SubController;
