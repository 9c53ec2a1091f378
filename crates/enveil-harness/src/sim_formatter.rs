//! Minimal message builder for simulation.

use bytes::Bytes;
use enveil_controller::{FormatError, MailDraft, MailFormatter, OutgoingMail};
use enveil_core::Recipient;

/// Builds a plain RFC 822-style message and enforces a size quota.
#[derive(Debug, Clone)]
pub struct SimFormatter {
    quota: usize,
}

impl SimFormatter {
    /// Default provider quota (25 MiB).
    pub const DEFAULT_QUOTA: usize = 25 * 1024 * 1024;

    /// Formatter rejecting messages larger than `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self { quota }
    }
}

impl Default for SimFormatter {
    fn default() -> Self {
        Self::with_quota(Self::DEFAULT_QUOTA)
    }
}

fn header_list(recipients: &[Recipient]) -> String {
    recipients.iter().map(|r| r.email.as_str()).collect::<Vec<_>>().join(", ")
}

impl MailFormatter for SimFormatter {
    fn format(&self, draft: &MailDraft<'_>) -> Result<OutgoingMail, FormatError> {
        if draft.to.is_empty() && draft.cc.is_empty() {
            return Err(FormatError::NoRecipients);
        }

        let mut raw = format!("From: {}\r\nTo: {}\r\n", draft.sender, header_list(draft.to));
        if !draft.cc.is_empty() {
            raw.push_str(&format!("Cc: {}\r\n", header_list(draft.cc)));
        }
        raw.push_str(&format!("Subject: {}\r\n\r\n{}\r\n", draft.subject, draft.armored));
        for attachment in draft.attachments {
            raw.push_str(&format!("\r\n[{}: {} bytes]", attachment.name, attachment.data.len()));
        }

        let size = raw.len() + draft.attachments.iter().map(|a| a.data.len()).sum::<usize>();
        if size > self.quota {
            return Err(FormatError::TooLarge { size, quota: self.quota });
        }

        Ok(OutgoingMail {
            account: draft.sender.to_owned(),
            raw: Bytes::from(raw),
            thread_id: draft.thread_id.map(str::to_owned),
        })
    }
}

#[cfg(test)]
mod tests {
    use enveil_controller::Attachment;

    use super::*;

    fn draft<'a>(to: &'a [Recipient], attachments: &'a [Attachment]) -> MailDraft<'a> {
        MailDraft {
            sender: "b@x.com",
            to,
            cc: &[],
            subject: "Plans",
            armored: "-----BEGIN PGP MESSAGE-----",
            attachments,
            thread_id: Some("t1"),
        }
    }

    #[test]
    fn builds_headers_and_keeps_thread() {
        let to = [Recipient::new("a@x.com")];
        let mail = SimFormatter::default().format(&draft(&to, &[])).unwrap();

        let raw = String::from_utf8(mail.raw.to_vec()).unwrap();
        assert!(raw.starts_with("From: b@x.com\r\nTo: a@x.com\r\n"));
        assert_eq!(mail.thread_id.as_deref(), Some("t1"));
    }

    #[test]
    fn rejects_missing_recipients_and_oversize() {
        assert_eq!(SimFormatter::default().format(&draft(&[], &[])), Err(FormatError::NoRecipients));

        let to = [Recipient::new("a@x.com")];
        let big = [Attachment { name: "a.gpg".into(), data: Bytes::from(vec![0u8; 2048]) }];
        let result = SimFormatter::with_quota(1024).format(&draft(&to, &big));
        assert!(matches!(result, Err(FormatError::TooLarge { quota: 1024, .. })));
    }
}
