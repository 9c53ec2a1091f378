//! Outbound message formatting boundary.

use enveil_core::Recipient;

use crate::{
    error::FormatError,
    event::{Attachment, OutgoingMail},
};

/// Everything needed to build the outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailDraft<'a> {
    /// Sending account.
    pub sender: &'a str,
    /// Primary recipients.
    pub to: &'a [Recipient],
    /// Copy recipients.
    pub cc: &'a [Recipient],
    /// Subject.
    pub subject: &'a str,
    /// Armored body.
    pub armored: &'a str,
    /// Encrypted attachments.
    pub attachments: &'a [Attachment],
    /// Thread to reply into.
    pub thread_id: Option<&'a str>,
}

/// Builds the transport-ready message from editor output.
///
/// MIME construction lives behind this trait; the controller only needs to
/// know whether it worked.
pub trait MailFormatter {
    /// Build the message.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the draft cannot be turned into a
    /// message, e.g. no recipients or over quota.
    fn format(&self, draft: &MailDraft<'_>) -> Result<OutgoingMail, FormatError>;
}
