//! End-to-end tests through the real runtimes.
//!
//! # Oracle Pattern
//!
//! Each scenario checks its own outcome and the standard invariants before it
//! returns; these tests only add cross-seed and determinism checks on top.

use std::time::Duration;

use enveil_app::{Background, FrameRuntime, HostEvent, RuntimeConfig};
use enveil_core::{ControllerId, Message, PortHub, ScopeSet};
use enveil_frame::{BodyFormat, Frame, FrameId, FrameStatus, HostPage, StatusMarker};
use enveil_harness::{
    Scenario, SimAuthorizer, SimEditor, SimEnv, SimFormatter, SimHost, SimTransport, scenario,
};
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn every_scenario_passes_across_seeds() {
    for seed in 0..8 {
        for scenario in Scenario::ALL {
            let result = scenario::run(scenario, seed).await;
            assert!(result.is_ok(), "{scenario} failed with seed {seed}: {:?}", result.err());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn same_seed_same_run() {
    let first = scenario::run(Scenario::ReplyAll, 42).await.unwrap();
    let second = scenario::run(Scenario::ReplyAll, 42).await.unwrap();

    assert_eq!(first.frame.id, second.frame.id);
    assert_eq!(first.elapsed, second.elapsed);
    assert_eq!(first.sent, second.sent);
    assert_eq!(first.editor.requests, second.editor.requests);
}

#[tokio::test(start_paused = true)]
async fn different_seeds_give_different_frame_ids() {
    let a = scenario::run(Scenario::WriteBack, 1).await.unwrap();
    let b = scenario::run(Scenario::WriteBack, 2).await.unwrap();
    assert_ne!(a.frame.id, b.frame.id);
}

#[tokio::test(start_paused = true)]
async fn notifications_auto_hide_only_on_success() {
    let report = scenario::run(Scenario::SendFailureRetry, 3).await.unwrap();
    let hides: Vec<_> = report.editor.notifications.iter().map(|(_, _, hide)| *hide).collect();

    assert_eq!(hides, vec![None, Some(RuntimeConfig::DEFAULT_NOTIFICATION_AUTO_HIDE)]);
}

#[tokio::test(start_paused = true)]
async fn recipients_reach_the_editor_with_key_status() {
    let report = scenario::run(Scenario::RecipientKeys, 5).await.unwrap();
    let (controller, to) = report.editor.recipients.first().cloned().unwrap();

    assert_eq!(to.len(), 2);
    assert_eq!(report.editor.recipient_actions_for(&controller).len(), 3);
    assert!(report.sent.is_empty());
}

/// A non-final close detaches after the exit animation, the frame can be
/// shown again, and the element going away destroys it along with its
/// controller.
#[tokio::test(start_paused = true)]
async fn detach_reattach_then_element_gone() {
    let config = RuntimeConfig::default();
    let env = SimEnv::with_seed(9);
    let transport = SimTransport::new();
    let (hub, acceptor) = PortHub::new();
    let (background, _handle) = Background::new(
        config.clone(),
        SimFormatter::default(),
        SimEditor::default(),
        transport.clone(),
        SimAuthorizer::new(transport),
    );
    let background = tokio::spawn(background.run(acceptor));

    let host = SimHost::textarea("compose-1");
    let id = FrameId::generate(&host.element_key(), &env);
    let port_name = id.port_name();
    let frame = Frame::new(id, host.clone(), config.frame_config(BodyFormat::Text));
    let (events, rx) = mpsc::channel(config.channel_capacity);
    let runtime = tokio::spawn(FrameRuntime::new(frame, hub.clone(), env).run(rx));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(host.page().marker, Some(StatusMarker::Attached));
    assert!(hub.is_live(&port_name));

    events.send(HostEvent::Close { final_close: false }).await.unwrap();
    tokio::time::sleep(config.close_delay / 2).await;
    assert_eq!(host.page().marker, Some(StatusMarker::Attached));
    assert!(!host.page().overlay_visible);

    tokio::time::sleep(config.close_delay).await;
    assert_eq!(host.page().marker, Some(StatusMarker::Detached));
    assert_eq!(host.page().overlays, 1);

    events.send(HostEvent::Reattach).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(host.page().marker, Some(StatusMarker::Attached));

    drop(events);
    let frame = runtime.await.unwrap().unwrap();
    assert_eq!(frame.status(), FrameStatus::Destroyed);
    assert_eq!(host.page().marker, None);
    assert_eq!(host.page().overlays, 0);

    drop(hub);
    let background = background.await.unwrap();
    assert!(background.registry().is_empty());
    assert!(!background.registry().contains(&ControllerId::from_port_name(&port_name)));
}

#[tokio::test(start_paused = true)]
async fn unauthorize_revokes_tokens() {
    let transport = SimTransport::new();
    transport.grant("bob@example.com", ScopeSet::send());
    let (hub, acceptor) = PortHub::new();
    let (background, _handle) = Background::new(
        RuntimeConfig::default(),
        SimFormatter::default(),
        SimEditor::default(),
        transport.clone(),
        SimAuthorizer::new(transport.clone()),
    );
    let background = tokio::spawn(background.run(acceptor));

    let port = hub.connect("gmailint-main").unwrap();
    port.emit(&Message::Unauthorize { account: "Bob@example.com".into() }).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    port.disconnect();
    drop(port);
    drop(hub);
    background.await.unwrap();

    assert_eq!(transport.revoked(), vec!["Bob@example.com".to_owned()]);
}
