//! Property-based tests for ports and parsers.
//!
//! Ports must deliver in order and report a disconnect exactly once no matter
//! what was queued before it. Parsers must never fail the caller on hostile
//! input from the host page.

use enveil_core::{
    Inbound, Message, Port, address,
    armor::{self, BEGIN_MARKER, END_MARKER},
};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        Just(Message::Destroy),
        Just(Message::EditorSessionClosed),
        any::<u64>().prop_map(|request_id| Message::GetRecipients { request_id }),
        "[a-z]{1,8}".prop_map(|account| Message::Unauthorize { account }),
    ]
}

fn drain(port: &mut Port) -> Vec<Inbound> {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        let mut seen = Vec::new();
        while let Some(inbound) = port.recv().await {
            seen.push(inbound);
        }
        seen
    })
}

proptest! {
    #[test]
    fn prop_port_is_fifo_then_one_disconnect(messages in prop::collection::vec(message_strategy(), 0..32)) {
        let (local, mut remote) = Port::pair("frame-prop");
        for message in &messages {
            local.emit(message).unwrap();
        }
        local.disconnect();

        let seen = drain(&mut remote);
        let (last, delivered) = seen.split_last().unwrap();

        prop_assert_eq!(last, &Inbound::Disconnected);
        let delivered: Vec<_> = delivered
            .iter()
            .map(|inbound| match inbound {
                Inbound::Message(m) => Some(m.clone()),
                Inbound::Disconnected => None,
            })
            .collect();
        prop_assert_eq!(delivered, messages.into_iter().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn prop_address_list_never_yields_invalid_entries(input in ".{0,200}") {
        for recipient in address::parse_address_list(&input) {
            prop_assert!(recipient.email.contains('@'));
            prop_assert!(!recipient.email.chars().any(char::is_whitespace));
        }
    }

    #[test]
    fn prop_extraction_is_idempotent(
        prefix in "[a-zA-Z \n]{0,40}",
        body in prop::collection::vec("[A-Za-z0-9+/=]{1,64}", 1..8),
        indent in " {0,4}",
    ) {
        let mangled = format!(
            "{prefix}\n{indent}{BEGIN_MARKER}\r\n\r\n{}\r\n{indent}{END_MARKER}\n",
            body.iter().map(|l| format!("{indent}{l}")).collect::<Vec<_>>().join("\r\n"),
        );

        let once = armor::extract_armored(&mangled).unwrap();
        let twice = armor::extract_armored(&once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(armor::contains_armored(&once));
    }
}
