//! Property-based tests for the frame state machine.
//!
//! Tests verify that invariants hold under arbitrary page events and port
//! messages, and that the keypress threshold and final close behave the same
//! on every path.

use enveil_core::{EditorOutput, Message, Recipient};
use enveil_frame::{Frame, FrameAction, FrameConfig, FrameId, FrameStatus, StatusMarker};
use enveil_harness::{FrameSnapshot, InvariantRegistry, SimHost, SystemSnapshot};
use proptest::prelude::*;

/// One thing that can happen to a frame.
#[derive(Debug, Clone)]
enum Step {
    Keypress,
    Resize,
    Activate,
    Reattach,
    Close(bool),
    /// The close timer fired.
    Finalize,
    PortLost,
    Inbound(Message),
}

fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        1 => Just(Message::Destroy),
        2 => Just(Message::EditorSessionClosed),
        2 => (0u64..5).prop_map(|request_id| Message::GetRecipients { request_id }),
        2 => "[a-z ]{0,20}".prop_map(|text| Message::SetEditorOutput(EditorOutput {
            text,
            to: vec![Recipient::new("a@x.com")],
            cc: Vec::new(),
        })),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => Just(Step::Keypress),
        1 => Just(Step::Resize),
        2 => Just(Step::Activate),
        2 => Just(Step::Reattach),
        2 => any::<bool>().prop_map(Step::Close),
        3 => Just(Step::Finalize),
        1 => Just(Step::PortLost),
        2 => message_strategy().prop_map(Step::Inbound),
    ]
}

fn frame(host: SimHost) -> Frame<SimHost> {
    Frame::new(FrameId::from_parts("compose-1", &[1; 16]), host, FrameConfig::default())
}

fn apply(frame: &mut Frame<SimHost>, step: Step) -> Vec<FrameAction> {
    match step {
        Step::Keypress => frame.on_keypress(),
        Step::Resize => {
            frame.on_resize();
            Vec::new()
        },
        Step::Activate => frame.on_overlay_activated().unwrap_or_default(),
        Step::Reattach => frame.reattach().unwrap_or_default(),
        Step::Close(final_close) => frame.begin_close(final_close),
        Step::Finalize => frame.finalize_close(),
        Step::PortLost => frame.on_port_disconnected(),
        Step::Inbound(message) => frame.handle_message(message).unwrap_or_default(),
    }
}

fn snapshot(frame: &Frame<SimHost>) -> SystemSnapshot {
    SystemSnapshot::default().with_frame(FrameSnapshot::of(frame))
}

fn disconnects(actions: &[FrameAction]) -> usize {
    actions.iter().filter(|a| matches!(a, FrameAction::DisconnectPort)).count()
}

proptest! {
    /// Frame invariants hold under arbitrary event sequences.
    #[test]
    fn prop_frame_invariants_hold(steps in prop::collection::vec(step_strategy(), 0..80)) {
        let registry = InvariantRegistry::standard();
        let mut frame = frame(SimHost::textarea("compose-1"));
        frame.attach_to().unwrap();

        for (i, step) in steps.into_iter().enumerate() {
            let _ = apply(&mut frame, step);
            let result = registry.check_all(&snapshot(&frame));
            prop_assert!(result.is_ok(), "step {}: {:?}", i, result);
        }
    }

    /// A destroyed frame never comes back and never touches the page again.
    #[test]
    fn prop_destroyed_is_terminal(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let host = SimHost::textarea("compose-1");
        let mut frame = frame(host.clone());
        frame.attach_to().unwrap();
        let _ = frame.close_frame(true);
        let page = host.page();

        for step in steps {
            let actions = apply(&mut frame, step);
            let emits = actions.iter().any(|a| matches!(a, FrameAction::Emit(_)));
            prop_assert!(!emits);
            prop_assert_eq!(frame.status(), FrameStatus::Destroyed);
        }
        prop_assert_eq!(host.page(), page);
    }

    /// Fewer keypresses than the threshold never close the frame.
    #[test]
    fn prop_below_threshold_keeps_overlay(presses in 0u32..FrameConfig::DEFAULT_KEYPRESS_THRESHOLD) {
        let host = SimHost::rich_text("compose-1");
        let mut frame = frame(host.clone());
        frame.attach_to().unwrap();

        for _ in 0..presses {
            prop_assert!(frame.on_keypress().is_empty());
        }
        prop_assert!(!frame.is_closing());
        prop_assert_eq!(host.page().marker, Some(StatusMarker::Attached));
    }

    /// Closing for good from any reachable state disconnects at most once
    /// and leaves no marker or overlay behind.
    #[test]
    fn prop_final_close_cleans_up(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let host = SimHost::textarea("compose-1");
        let mut frame = frame(host.clone());
        let mut total = disconnects(&frame.attach_to().unwrap());

        for step in steps {
            total += disconnects(&apply(&mut frame, step));
        }
        total += disconnects(&frame.close_frame(true));
        total += disconnects(&frame.close_frame(true));

        prop_assert_eq!(frame.status(), FrameStatus::Destroyed);
        prop_assert!(total <= 1);
        prop_assert_eq!(host.page().marker, None);
        prop_assert_eq!(host.page().overlays, 0);
    }
}

#[test]
fn threshold_keypress_dismisses() {
    let host = SimHost::rich_text("compose-1");
    let mut frame = frame(host.clone());
    frame.attach_to().unwrap();

    for _ in 1..FrameConfig::DEFAULT_KEYPRESS_THRESHOLD {
        assert!(frame.on_keypress().is_empty());
    }
    let actions = frame.on_keypress();
    assert!(matches!(actions.as_slice(), [FrameAction::ScheduleFinalize { .. }]));
    assert!(!host.page().overlay_visible);

    assert_eq!(disconnects(&frame.finalize_close()), 1);
    assert_eq!(frame.status(), FrameStatus::Destroyed);
    assert_eq!(host.page().marker, None);
    InvariantRegistry::standard()
        .assert_all(&SystemSnapshot::default().with_frame(FrameSnapshot::of(&frame)), "after dismissal");

    // Further typing is not counted.
    assert!(frame.on_keypress().is_empty());
    assert_eq!(frame.keypresses(), FrameConfig::DEFAULT_KEYPRESS_THRESHOLD);
}

#[test]
fn attach_then_final_close_disconnects_once() {
    let host = SimHost::textarea("compose-1");
    let mut frame = frame(host.clone());

    let actions = frame.attach_to().unwrap();
    assert!(matches!(actions.as_slice(), [FrameAction::OpenPort { .. }]));
    assert_eq!(host.page().marker, Some(StatusMarker::Attached));
    assert_eq!(host.page().overlays, 1);
    let registry = InvariantRegistry::standard();
    registry.assert_all(&SystemSnapshot::default().with_frame(FrameSnapshot::of(&frame)), "after attach");

    assert_eq!(disconnects(&frame.close_frame(true)), 1);
    registry.assert_all(&SystemSnapshot::default().with_frame(FrameSnapshot::of(&frame)), "after final close");
    assert_eq!(host.page().marker, None);
    assert_eq!(host.page().overlays, 0);
    assert!(frame.close_frame(true).is_empty());
}
