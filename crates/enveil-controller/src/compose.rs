//! Reply and forward derivation.
//!
//! Turns a fetched [`SourceMessage`] into the [`ComposeRequest`] the editor is
//! opened with. Header parsing never fails: unparseable addresses are skipped.

use enveil_core::{
    ComposeRequest, Recipient,
    address::{parse_address, parse_address_list, same_address},
};

use crate::event::SourceMessage;

/// Subject prefix of a reply.
pub const REPLY_PREFIX: &str = "Re: ";

/// Subject prefix of a forward.
pub const FORWARD_PREFIX: &str = "Fwd: ";

/// Separator line opening a forwarded message.
pub const FORWARD_SEPARATOR: &str = "---------- Forwarded message ----------";

/// Recipients of a reply.
///
/// To is always the original sender. A reply-all adds the original To and Cc
/// recipients as Cc, minus the replying account and the sender, deduplicated
/// case-insensitively in first-seen order.
pub fn reply_recipients(
    source: &SourceMessage,
    account: &str,
    include_all: bool,
) -> (Vec<Recipient>, Vec<Recipient>) {
    let sender = parse_address(&source.from);
    let to: Vec<_> = sender.iter().cloned().collect();
    if !include_all {
        return (to, Vec::new());
    }

    let mut cc: Vec<Recipient> = Vec::new();
    for recipient in parse_address_list(&source.to).into_iter().chain(parse_address_list(&source.cc)) {
        let is_sender = sender.as_ref().is_some_and(|s| same_address(&s.email, &recipient.email));
        let is_duplicate = cc.iter().any(|seen| same_address(&seen.email, &recipient.email));
        if is_sender || is_duplicate || same_address(&recipient.email, account) {
            continue;
        }
        cc.push(recipient);
    }
    (to, cc)
}

/// `Re: ` prefixed subject, without doubling an existing prefix.
pub fn reply_subject(subject: &str) -> String {
    prefixed(subject, REPLY_PREFIX, &["re:"])
}

/// `Fwd: ` prefixed subject, without doubling an existing prefix.
pub fn forward_subject(subject: &str) -> String {
    prefixed(subject, FORWARD_PREFIX, &["fwd:", "fw:"])
}

/// Attribution line above a quoted reply: `On <date>, <sender> wrote:`.
pub fn reply_header(source: &SourceMessage) -> String {
    let sender = parse_address(&source.from)
        .map(|r| r.name.unwrap_or(r.email))
        .unwrap_or_else(|| source.from.trim().to_owned());
    let date = source.date.trim();

    if date.is_empty() { format!("{sender} wrote:") } else { format!("On {date}, {sender} wrote:") }
}

/// Header block above a forwarded message.
pub fn forward_header(source: &SourceMessage) -> String {
    let mut header = format!(
        "{FORWARD_SEPARATOR}\nFrom: {}\nDate: {}\nSubject: {}\nTo: {}",
        source.from.trim(),
        source.date.trim(),
        source.subject.trim(),
        source.to.trim()
    );
    if !source.cc.trim().is_empty() {
        header.push_str("\nCc: ");
        header.push_str(source.cc.trim());
    }
    header
}

/// Compose request for an encrypted reply.
pub fn reply_request(source: &SourceMessage, account: &str, include_all: bool) -> ComposeRequest {
    let (recipients, cc) = reply_recipients(source, account, include_all);
    ComposeRequest {
        recipients,
        cc,
        subject: Some(reply_subject(&source.subject)),
        quoted_mail: Some(source.body.clone()),
        quoted_mail_header: Some(reply_header(source)),
        thread_id: source.thread_id.clone(),
        account: Some(account.to_owned()),
        integration: true,
        ..ComposeRequest::default()
    }
}

/// Compose request for an encrypted forward. Recipients are left to the
/// user.
pub fn forward_request(source: &SourceMessage, account: &str) -> ComposeRequest {
    ComposeRequest {
        subject: Some(forward_subject(&source.subject)),
        quoted_mail: Some(source.body.clone()),
        quoted_mail_header: Some(forward_header(source)),
        account: Some(account.to_owned()),
        integration: true,
        ..ComposeRequest::default()
    }
}

fn prefixed(subject: &str, prefix: &str, existing: &[&str]) -> String {
    let subject = subject.trim();
    let lower = subject.to_ascii_lowercase();
    if existing.iter().any(|p| lower.starts_with(p)) {
        subject.to_owned()
    } else {
        format!("{prefix}{subject}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceMessage {
        SourceMessage {
            message_id: "m1".into(),
            thread_id: Some("t1".into()),
            from: "Alice <a@x.com>".into(),
            to: "b@x.com, c@x.com".into(),
            cc: "d@x.com".into(),
            subject: "Plans".into(),
            date: "Mon, 3 Aug 2026 10:00".into(),
            body: "-----BEGIN PGP MESSAGE-----\n\nabc\n-----END PGP MESSAGE-----".into(),
        }
    }

    fn emails(list: &[Recipient]) -> Vec<&str> {
        list.iter().map(|r| r.email.as_str()).collect()
    }

    #[test]
    fn reply_all_excludes_account_and_sender() {
        let (to, cc) = reply_recipients(&source(), "b@x.com", true);
        assert_eq!(emails(&to), ["a@x.com"]);
        assert_eq!(emails(&cc), ["c@x.com", "d@x.com"]);
    }

    #[test]
    fn plain_reply_goes_to_sender_only() {
        let (to, cc) = reply_recipients(&source(), "b@x.com", false);
        assert_eq!(emails(&to), ["a@x.com"]);
        assert!(cc.is_empty());
    }

    #[test]
    fn reply_all_dedupes_ignoring_case() {
        let mut message = source();
        message.to = "B@X.com, C@x.com, A@x.com".into();
        message.cc = "c@X.COM, d@x.com, d@x.com".into();

        let (_, cc) = reply_recipients(&message, "b@x.com", true);
        assert_eq!(emails(&cc), ["C@x.com", "d@x.com"]);
    }

    #[test]
    fn unparseable_headers_degrade_to_empty() {
        let mut message = source();
        message.from = "not an address".into();
        message.to = "<<<".into();
        message.cc = String::new();

        let (to, cc) = reply_recipients(&message, "b@x.com", true);
        assert!(to.is_empty());
        assert!(cc.is_empty());
        assert_eq!(reply_header(&message), "On Mon, 3 Aug 2026 10:00, not an address wrote:");
    }

    #[test]
    fn subject_prefix_is_not_doubled() {
        assert_eq!(reply_subject("Plans"), "Re: Plans");
        assert_eq!(reply_subject("RE: Plans"), "RE: Plans");
        assert_eq!(forward_subject("Plans"), "Fwd: Plans");
        assert_eq!(forward_subject("Fw: Plans"), "Fw: Plans");
        assert_eq!(forward_subject("Re: Plans"), "Fwd: Re: Plans");
    }

    #[test]
    fn reply_header_uses_display_name() {
        assert_eq!(reply_header(&source()), "On Mon, 3 Aug 2026 10:00, Alice wrote:");

        let mut undated = source();
        undated.date = String::new();
        assert_eq!(reply_header(&undated), "Alice wrote:");
    }

    #[test]
    fn reply_request_carries_thread_and_quote() {
        let request = reply_request(&source(), "b@x.com", true);

        assert_eq!(request.subject.as_deref(), Some("Re: Plans"));
        assert_eq!(request.thread_id.as_deref(), Some("t1"));
        assert_eq!(request.quoted_mail, Some(source().body));
        assert_eq!(request.account.as_deref(), Some("b@x.com"));
        assert!(request.integration);
    }

    #[test]
    fn forward_request_leaves_recipients_empty() {
        let request = forward_request(&source(), "b@x.com");

        assert!(request.recipients.is_empty());
        assert!(request.cc.is_empty());
        assert_eq!(request.thread_id, None);
        let header = request.quoted_mail_header.unwrap();
        assert!(header.starts_with(FORWARD_SEPARATOR));
        assert!(header.ends_with("\nCc: d@x.com"));
    }
}
