//! Port protocol between frames and controllers.
//!
//! Every message crossing a [`crate::Port`] is a [`Message`]. On the wire it
//! is a CBOR map tagged by the `event` field, so the receiving context can
//! dispatch on the event name before touching the payload.
//!
//! # Events
//!
//! | Event | Direction | Payload |
//! |-------|-----------|---------|
//! | `get-recipients` | controller → frame | request id |
//! | `recipients` | frame → controller | request id, recipients |
//! | `eframe-display-editor` | frame → controller | [`ComposeRequest`] |
//! | `open-editor` | integration → controller | [`ComposeRequest`] |
//! | `secure-reply` | integration → controller | message id, reply-all flag |
//! | `secure-forward` | integration → controller | message id |
//! | `set-editor-output` | controller → frame | [`EditorOutput`] |
//! | `destroy` | controller → frame | none |
//! | `editor-session-closed` | either | none (alias `mail-editor-close`) |
//! | `gmail-unauthorize` | integration → controller | account |
//! | `set-encrypted-attachments` | editor → controller | target controller id |

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Maximum encoded message size (4 MiB).
///
/// Armored bodies with attachments stay well below this; anything larger is
/// rejected before decoding.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Event names as they appear on the wire.
pub mod events {
    /// Controller asks the frame for the host page recipients.
    pub const GET_RECIPIENTS: &str = "get-recipients";
    /// Frame answers a recipient request.
    pub const RECIPIENTS: &str = "recipients";
    /// Frame overlay was activated.
    pub const DISPLAY_EDITOR: &str = "eframe-display-editor";
    /// Integration asks for a compose editor.
    pub const OPEN_EDITOR: &str = "open-editor";
    /// Integration asks for an encrypted reply.
    pub const SECURE_REPLY: &str = "secure-reply";
    /// Integration asks for an encrypted forward.
    pub const SECURE_FORWARD: &str = "secure-forward";
    /// Controller hands ciphertext back to the frame.
    pub const SET_EDITOR_OUTPUT: &str = "set-editor-output";
    /// Controller forces a final frame close.
    pub const DESTROY: &str = "destroy";
    /// Editor session ended; clear active visual state.
    pub const EDITOR_SESSION_CLOSED: &str = "editor-session-closed";
    /// Legacy name of [`EDITOR_SESSION_CLOSED`].
    pub const MAIL_EDITOR_CLOSE: &str = "mail-editor-close";
    /// Drop stored authorization for an account.
    pub const UNAUTHORIZE: &str = "gmail-unauthorize";
    /// Encrypted attachment names for another controller.
    pub const SET_ENCRYPTED_ATTACHMENTS: &str = "set-encrypted-attachments";
}

/// A mail recipient as exchanged between contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    /// Bare email address.
    pub email: String,
    /// Display name, if the host page knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Recipient {
    /// Recipient with only an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into(), name: None }
    }

    /// Recipient with a display name.
    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self { email: email.into(), name: Some(name.into()) }
    }
}

/// Request to open a compose editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeRequest {
    /// Plaintext to prefill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Armored block found in the compose body, offered as quoted mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_mail: Option<String>,
    /// Primary recipients: those entered in the host page, or derived from
    /// the message being replied to.
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    /// Copy recipients derived for a reply-all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Recipient>,
    /// Subject to prefill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Attribution line shown above the quoted mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_mail_header: Option<String>,
    /// Indent the quoted mail. Cleared once a message was sent from this
    /// controller, so follow-ups are not indented twice.
    #[serde(default)]
    pub quoted_mail_indent: bool,
    /// Provider thread the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Account the host page is signed in as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    /// Send through the mail API instead of writing back into the page.
    #[serde(default)]
    pub integration: bool,
}

/// Ciphertext and recipients written back into the host page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorOutput {
    /// Armored message body.
    pub text: String,
    /// Primary recipients.
    #[serde(default)]
    pub to: Vec<Recipient>,
    /// Copy recipients.
    #[serde(default)]
    pub cc: Vec<Recipient>,
}

/// Every event that crosses a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Message {
    /// Controller asks the frame for the host page recipients.
    #[serde(rename = "get-recipients")]
    GetRecipients {
        /// Correlates the answer.
        request_id: u64,
    },

    /// Frame answers [`Message::GetRecipients`].
    #[serde(rename = "recipients")]
    Recipients {
        /// Request being answered.
        request_id: u64,
        /// Recipients currently in the host page.
        recipients: Vec<Recipient>,
    },

    /// Frame overlay was activated.
    #[serde(rename = "eframe-display-editor")]
    DisplayEditor(ComposeRequest),

    /// Integration asks for a compose editor.
    #[serde(rename = "open-editor")]
    OpenEditor(ComposeRequest),

    /// Integration asks for an encrypted reply.
    #[serde(rename = "secure-reply")]
    SecureReply {
        /// Provider id of the message being replied to.
        message_id: String,
        /// Reply to all original recipients.
        include_all: bool,
        /// Account replying.
        account: String,
    },

    /// Integration asks for an encrypted forward.
    #[serde(rename = "secure-forward")]
    SecureForward {
        /// Provider id of the message being forwarded.
        message_id: String,
        /// Account forwarding.
        account: String,
    },

    /// Controller hands ciphertext back to the frame.
    #[serde(rename = "set-editor-output")]
    SetEditorOutput(EditorOutput),

    /// Controller forces a final frame close.
    #[serde(rename = "destroy")]
    Destroy,

    /// Editor session ended.
    #[serde(rename = "editor-session-closed", alias = "mail-editor-close")]
    EditorSessionClosed,

    /// Drop stored authorization for an account.
    #[serde(rename = "gmail-unauthorize")]
    Unauthorize {
        /// Account to unauthorize.
        account: String,
    },

    /// Encrypted attachment names destined for another controller.
    #[serde(rename = "set-encrypted-attachments")]
    SetEncryptedAttachments {
        /// Prefixed id of the target controller (e.g. `dframe-1a2b`).
        controller_id: String,
        /// Account owning the message.
        account: String,
        /// Message carrying the attachments.
        message_id: String,
        /// Encrypted attachment file names.
        file_names: Vec<String>,
    },
}

impl Message {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetRecipients { .. } => events::GET_RECIPIENTS,
            Self::Recipients { .. } => events::RECIPIENTS,
            Self::DisplayEditor(_) => events::DISPLAY_EDITOR,
            Self::OpenEditor(_) => events::OPEN_EDITOR,
            Self::SecureReply { .. } => events::SECURE_REPLY,
            Self::SecureForward { .. } => events::SECURE_FORWARD,
            Self::SetEditorOutput(_) => events::SET_EDITOR_OUTPUT,
            Self::Destroy => events::DESTROY,
            Self::EditorSessionClosed => events::EDITOR_SESSION_CLOSED,
            Self::Unauthorize { .. } => events::UNAUTHORIZE,
            Self::SetEncryptedAttachments { .. } => events::SET_ENCRYPTED_ATTACHMENTS,
        }
    }

    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
        if buf.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::TooLarge { size: buf.len(), max: MAX_MESSAGE_SIZE });
        }
        Ok(Bytes::from(buf))
    }

    /// Decode from CBOR.
    ///
    /// Oversized input is rejected before parsing.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::TooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE });
        }
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use ciborium::Value;

    use super::*;

    fn wire_tag(message: &Message) -> Option<String> {
        let bytes = message.encode().ok()?;
        let value: Value = ciborium::from_reader(&bytes[..]).ok()?;
        value.as_map()?.iter().find_map(|(k, v)| {
            (k.as_text() == Some("event")).then(|| v.as_text().map(str::to_owned)).flatten()
        })
    }

    #[test]
    fn wire_tag_matches_event_name() {
        let samples = [
            Message::GetRecipients { request_id: 1 },
            Message::Recipients { request_id: 1, recipients: vec![] },
            Message::DisplayEditor(ComposeRequest::default()),
            Message::OpenEditor(ComposeRequest::default()),
            Message::SecureReply {
                message_id: "m1".into(),
                include_all: true,
                account: "b@x.com".into(),
            },
            Message::SecureForward { message_id: "m1".into(), account: "b@x.com".into() },
            Message::SetEditorOutput(EditorOutput::default()),
            Message::Destroy,
            Message::EditorSessionClosed,
            Message::Unauthorize { account: "b@x.com".into() },
            Message::SetEncryptedAttachments {
                controller_id: "dframe-1".into(),
                account: "b@x.com".into(),
                message_id: "m1".into(),
                file_names: vec!["a.pgp".into()],
            },
        ];

        for message in samples {
            assert_eq!(wire_tag(&message).as_deref(), Some(message.name()));
        }
    }

    #[test]
    fn legacy_close_event_decodes() {
        let mut buf = Vec::new();
        let value = Value::Map(vec![(
            Value::Text("event".into()),
            Value::Text(events::MAIL_EDITOR_CLOSE.into()),
        )]);
        ciborium::into_writer(&value, &mut buf).unwrap();

        assert_eq!(Message::decode(&buf).unwrap(), Message::EditorSessionClosed);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let mut buf = Vec::new();
        let value =
            Value::Map(vec![(Value::Text("event".into()), Value::Text("format-disk".into()))]);
        ciborium::into_writer(&value, &mut buf).unwrap();

        assert!(matches!(Message::decode(&buf), Err(CodecError::Decode(_))));
    }

    #[test]
    fn oversized_input_is_rejected_before_parsing() {
        let buf = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(Message::decode(&buf), Err(CodecError::TooLarge { .. })));
    }

    #[test]
    fn set_editor_output_survives_the_wire() {
        let message = Message::SetEditorOutput(EditorOutput {
            text: "-----BEGIN PGP MESSAGE-----".into(),
            to: vec![Recipient::named("a@x.com", "Alice")],
            cc: vec![Recipient::new("c@x.com")],
        });

        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }
}
