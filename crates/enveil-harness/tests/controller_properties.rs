//! Property-based tests for the mail controller.
//!
//! Arbitrary interleavings of port messages, collaborator completions (both
//! current and stale) and editor UI events are fed to one controller. After
//! every event the standard invariants must hold and the editor session must
//! only be released by the event that ended it.

use std::collections::HashMap;

use bytes::Bytes;
use enveil_controller::{
    Attachment, AuthError, ControllerAction, ControllerEvent, ControllerState, EditorError, EncryptOutput,
    MailController, OpId, SendReceipt, SourceMessage, TransportError,
};
use enveil_core::{AccessToken, ComposeRequest, Message, Recipient, ScopeSet};
use enveil_harness::{ControllerSnapshot, InvariantRegistry, SimFormatter, SystemSnapshot};
use proptest::prelude::*;

const ACCOUNTS: [&str; 2] = ["bob@example.com", "eve@example.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Request {
    Encrypt,
    Token,
    Fetch,
    Send,
    Prompt,
}

/// One thing that can happen to a controller.
#[derive(Debug, Clone)]
enum Step {
    Open { integration: bool },
    Reply { account: usize, include_all: bool },
    Forward { account: usize },
    Encrypted { outcome: u8, stale: bool },
    Token { granted: bool, stale: bool },
    Fetched { found: bool, stale: bool },
    Sent { ok: bool, stale: bool },
    Authorized { account: usize, stale: bool },
    AuthorizationFailed { account: usize, stale: bool },
    Dismissed,
    Retry,
    RecipientsRequested,
    Unauthorize { account: usize },
    Disconnected,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => any::<bool>().prop_map(|integration| Step::Open { integration }),
        2 => (0..ACCOUNTS.len(), any::<bool>())
            .prop_map(|(account, include_all)| Step::Reply { account, include_all }),
        1 => (0..ACCOUNTS.len()).prop_map(|account| Step::Forward { account }),
        4 => (0u8..4, prop::bool::weighted(0.2)).prop_map(|(outcome, stale)| Step::Encrypted { outcome, stale }),
        4 => (any::<bool>(), prop::bool::weighted(0.2)).prop_map(|(granted, stale)| Step::Token { granted, stale }),
        2 => (any::<bool>(), prop::bool::weighted(0.2)).prop_map(|(found, stale)| Step::Fetched { found, stale }),
        3 => (any::<bool>(), prop::bool::weighted(0.2)).prop_map(|(ok, stale)| Step::Sent { ok, stale }),
        2 => (0..ACCOUNTS.len(), prop::bool::weighted(0.2))
            .prop_map(|(account, stale)| Step::Authorized { account, stale }),
        1 => (0..ACCOUNTS.len(), prop::bool::weighted(0.2))
            .prop_map(|(account, stale)| Step::AuthorizationFailed { account, stale }),
        1 => Just(Step::Dismissed),
        2 => Just(Step::Retry),
        1 => Just(Step::RecipientsRequested),
        1 => (0..ACCOUNTS.len()).prop_map(|account| Step::Unauthorize { account }),
        1 => Just(Step::Disconnected),
    ]
}

/// Drives one controller and remembers the latest id of each request kind.
struct Driver {
    controller: MailController<SimFormatter>,
    issued: HashMap<Request, OpId>,
}

impl Driver {
    fn new() -> Self {
        Self { controller: MailController::new("frame-1a2b", SimFormatter::default()), issued: HashMap::new() }
    }

    /// Latest id of `kind`, or one that was never current.
    fn op(&self, kind: Request, stale: bool) -> OpId {
        match self.issued.get(&kind) {
            Some(op) if !stale => *op,
            Some(op) => OpId(op.0.wrapping_sub(1)),
            None => OpId(0),
        }
    }

    fn event(&self, step: Step) -> ControllerEvent {
        match step {
            Step::Open { integration } => ControllerEvent::Inbound(Message::OpenEditor(ComposeRequest {
                text: Some("hello".into()),
                recipients: vec![Recipient::new("alice@example.com")],
                account: Some(ACCOUNTS[0].into()),
                integration,
                ..ComposeRequest::default()
            })),
            Step::Reply { account, include_all } => ControllerEvent::Inbound(Message::SecureReply {
                message_id: "m1".into(),
                include_all,
                account: ACCOUNTS[account].into(),
            }),
            Step::Forward { account } => ControllerEvent::Inbound(Message::SecureForward {
                message_id: "m1".into(),
                account: ACCOUNTS[account].into(),
            }),
            Step::Encrypted { outcome, stale } => ControllerEvent::EncryptCompleted {
                op: self.op(Request::Encrypt, stale),
                result: encrypt_result(outcome),
            },
            Step::Token { granted, stale } => ControllerEvent::TokenResolved {
                op: self.op(Request::Token, stale),
                token: granted.then(|| AccessToken::new("t", ScopeSet::read_and_send())),
            },
            Step::Fetched { found, stale } => ControllerEvent::SourceFetched {
                op: self.op(Request::Fetch, stale),
                result: if found {
                    Ok(SourceMessage {
                        message_id: "m1".into(),
                        from: "alice@example.com".into(),
                        to: "bob@example.com, carol@example.com".into(),
                        subject: "Plans".into(),
                        body: "See you.".into(),
                        ..SourceMessage::default()
                    })
                } else {
                    Err(TransportError::NotFound { message_id: "m1".into() })
                },
            },
            Step::Sent { ok, stale } => ControllerEvent::MessageSent {
                op: self.op(Request::Send, stale),
                result: if ok {
                    Ok(SendReceipt { message_id: "s1".into() })
                } else {
                    Err(TransportError::Network("reset".into()))
                },
            },
            Step::Authorized { account, stale } => ControllerEvent::Authorized {
                op: self.op(Request::Prompt, stale),
                account: ACCOUNTS[account].into(),
                scopes: ScopeSet::read_and_send(),
            },
            Step::AuthorizationFailed { account, stale } => ControllerEvent::AuthorizationFailed {
                op: self.op(Request::Prompt, stale),
                account: ACCOUNTS[account].into(),
                error: AuthError::Cancelled,
            },
            Step::Dismissed => ControllerEvent::EditorDismissed,
            Step::Retry => ControllerEvent::Retry,
            Step::RecipientsRequested => ControllerEvent::RecipientsRequested,
            Step::Unauthorize { account } => {
                ControllerEvent::Inbound(Message::Unauthorize { account: ACCOUNTS[account].into() })
            },
            Step::Disconnected => ControllerEvent::PortDisconnected,
        }
    }

    fn apply(&mut self, step: Step) -> Vec<ControllerAction> {
        let event = self.event(step);
        let actions = self.controller.handle(event);
        for action in &actions {
            let issued = match action {
                ControllerAction::Encrypt { op, .. } => Some((Request::Encrypt, *op)),
                ControllerAction::RequestToken { op, .. } => Some((Request::Token, *op)),
                ControllerAction::FetchSource { op, .. } => Some((Request::Fetch, *op)),
                ControllerAction::SendMessage { op, .. } => Some((Request::Send, *op)),
                ControllerAction::OpenAuthorizeDialog { op, .. } => Some((Request::Prompt, *op)),
                _ => None,
            };
            if let Some((kind, op)) = issued {
                self.issued.insert(kind, op);
            }
        }
        actions
    }

    fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::default().with_controller(ControllerSnapshot::of(&self.controller))
    }
}

fn encrypt_result(outcome: u8) -> Result<EncryptOutput, EditorError> {
    match outcome {
        0 => Ok(EncryptOutput {
            armored: "-----BEGIN PGP MESSAGE-----".into(),
            attachments: vec![Attachment { name: "a.txt.gpg".into(), data: Bytes::from_static(b"x") }],
            subject: "Hi".into(),
            to: vec![Recipient::new("alice@example.com")],
            cc: Vec::new(),
        }),
        // No recipients: formatting fails.
        1 => Ok(EncryptOutput { armored: "-----BEGIN PGP MESSAGE-----".into(), ..EncryptOutput::default() }),
        2 => Err(EditorError::Cancelled),
        _ => Err(EditorError::Failed("bad key".into())),
    }
}

fn count(actions: &[ControllerAction], wanted: fn(&ControllerAction) -> bool) -> usize {
    actions.iter().filter(|a| wanted(a)).count()
}

proptest! {
    /// Controller invariants hold under arbitrary event sequences.
    #[test]
    fn prop_controller_invariants_hold(steps in prop::collection::vec(step_strategy(), 0..100)) {
        let registry = InvariantRegistry::standard();
        let mut driver = Driver::new();

        for (i, step) in steps.into_iter().enumerate() {
            let _ = driver.apply(step);
            let result = registry.check_all(&driver.snapshot());
            prop_assert!(result.is_ok(), "step {}: {:?}", i, result);
        }
    }

    /// The session is released exactly by the event that ends it.
    #[test]
    fn prop_release_matches_session_end(steps in prop::collection::vec(step_strategy(), 0..100)) {
        let mut driver = Driver::new();

        for step in steps {
            let had_session = driver.controller.has_session();
            let actions = driver.apply(step.clone());
            let releases = count(&actions, |a| matches!(a, ControllerAction::ReleaseEditor));

            prop_assert!(releases <= 1, "{:?} released {} times", step, releases);
            if releases == 1 {
                prop_assert!(had_session, "{:?} released without a session", step);
            }
            if had_session && !driver.controller.has_session() {
                prop_assert_eq!(releases, 1, "{:?} dropped the session silently", step);
            }
        }
    }

    /// A pending action produces at most one resumption per authorization.
    #[test]
    fn prop_authorization_resumes_once(steps in prop::collection::vec(step_strategy(), 0..60)) {
        let mut driver = Driver::new();

        for step in steps {
            let was_awaiting = driver.controller.state() == ControllerState::AwaitingAuth;
            let authorized = matches!(step, Step::Authorized { .. });
            let actions = driver.apply(step);

            if authorized && !was_awaiting {
                prop_assert!(actions.is_empty());
            }
            let resumptions = count(&actions, |a| matches!(a, ControllerAction::RequestToken { .. }));
            prop_assert!(resumptions <= 1);
        }
    }

    /// The outcome of a prompt that is no longer current changes nothing.
    #[test]
    fn prop_stale_authorization_is_inert(steps in prop::collection::vec(step_strategy(), 0..80)) {
        let mut driver = Driver::new();

        for step in steps {
            let stale = matches!(
                step,
                Step::Authorized { stale: true, .. } | Step::AuthorizationFailed { stale: true, .. }
            );
            let before = (driver.controller.state(), driver.controller.pending().cloned());
            let actions = driver.apply(step.clone());

            if stale {
                prop_assert!(actions.is_empty(), "{:?} produced {:?}", step, actions);
                let after = (driver.controller.state(), driver.controller.pending().cloned());
                prop_assert_eq!(before, after);
            }
        }
    }
}
