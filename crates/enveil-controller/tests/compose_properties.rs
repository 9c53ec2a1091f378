//! Property-based tests for reply and forward derivation.

use enveil_controller::{
    SourceMessage,
    compose::{forward_subject, reply_recipients, reply_subject},
};
use enveil_core::address::same_address;
use proptest::prelude::*;

const POOL: [&str; 5] = ["a@x.com", "b@x.com", "c@x.com", "d@x.com", "e@y.org"];

/// An address from the pool, randomly upper-cased.
fn address() -> impl Strategy<Value = String> {
    (0..POOL.len(), any::<bool>())
        .prop_map(|(i, upper)| if upper { POOL[i].to_ascii_uppercase() } else { POOL[i].to_owned() })
}

fn header() -> impl Strategy<Value = String> {
    prop::collection::vec(address(), 0..6).prop_map(|list| list.join(", "))
}

fn source() -> impl Strategy<Value = SourceMessage> {
    (address(), header(), header()).prop_map(|(from, to, cc)| SourceMessage {
        message_id: "m1".into(),
        from,
        to,
        cc,
        subject: "Plans".into(),
        ..SourceMessage::default()
    })
}

proptest! {
    /// Reply-all copies nobody twice, never the replying account and never
    /// the sender, and only people who were on the original message.
    #[test]
    fn prop_reply_all_cc_is_clean(source in source(), account in address()) {
        let (to, cc) = reply_recipients(&source, &account, true);

        prop_assert_eq!(to.len(), 1);
        prop_assert!(same_address(&to[0].email, &source.from));

        for (i, recipient) in cc.iter().enumerate() {
            prop_assert!(!same_address(&recipient.email, &account));
            prop_assert!(!same_address(&recipient.email, &source.from));
            prop_assert!(cc[..i].iter().all(|seen| !same_address(&seen.email, &recipient.email)));

            let original = format!("{}, {}", source.to, source.cc).to_ascii_lowercase();
            prop_assert!(original.contains(&recipient.email.to_ascii_lowercase()));
        }
    }

    /// A plain reply never copies anyone.
    #[test]
    fn prop_plain_reply_has_no_cc(source in source(), account in address()) {
        let (_, cc) = reply_recipients(&source, &account, false);
        prop_assert!(cc.is_empty());
    }

    /// Prefixing a subject twice is the same as prefixing it once.
    #[test]
    fn prop_subject_prefix_is_idempotent(subject in "[A-Za-z][A-Za-z :]{0,23}") {
        let reply = reply_subject(&subject);
        prop_assert_eq!(reply_subject(&reply), reply);

        let forward = forward_subject(&subject);
        prop_assert_eq!(forward_subject(&forward), forward);
    }
}
