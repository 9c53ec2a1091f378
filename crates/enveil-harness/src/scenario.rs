//! End-to-end scenarios.
//!
//! Each scenario wires the real [`FrameRuntime`] and [`Background`] to the
//! simulated page, editor, provider and authorization prompt, drives one user
//! story and checks both its outcome and the standard invariants on the
//! destroyed frame.
//!
//! Scenarios must run on a current-thread tokio runtime with paused time:
//! provider latency and editor think time are drawn from the seed, and the
//! paused clock skips them instantly and in a reproducible order.

use std::{fmt, time::Duration};

use enveil_app::{Background, BackgroundHandle, FrameRuntime, HostEvent, RuntimeConfig, RuntimeError};
use enveil_controller::{
    ControllerEvent, NotificationKind, OutgoingMail, SENT_MESSAGE, SourceMessage, TransportError,
    recipients::{KeyRef, RecipientAction, TagColor},
};
use enveil_core::{ControllerId, Message, PortError, PortHub, Recipient, ScopeSet};
use enveil_frame::{BodyFormat, Frame, FrameId, HostPage, StatusMarker};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use crate::{
    invariants::{FrameSnapshot, InvariantRegistry, SystemSnapshot, Violation},
    sim_editor::{EditorLog, EditorOutcome, SimEditor, sim_armor},
    sim_env::SimEnv,
    sim_formatter::SimFormatter,
    sim_host::{PageState, SimHost},
    sim_transport::{SimAuthorizer, SimTransport},
};

/// Account every scenario signs in as.
pub const ACCOUNT: &str = "bob@example.com";

/// Port name the provider integration script connects with.
pub const INTEGRATION_PORT: &str = "gmailint-main";

/// Upper bound of seeded provider latency, in milliseconds.
const MAX_LATENCY_MS: u64 = 250;

/// Upper bound of seeded editor think time, in milliseconds.
const MAX_THINK_MS: u64 = 2_000;

/// Virtual time given to the system to go quiet after each step.
const SETTLE: Duration = Duration::from_secs(10);

type SimBackground = Background<SimFormatter, SimEditor, SimTransport, SimAuthorizer>;

/// Named user stories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Compose in the overlay and send through the mail API.
    ComposeAndSend,
    /// No mail API: ciphertext is written back into the page.
    WriteBack,
    /// The user closes the editor without encrypting.
    Cancel,
    /// Encrypted reply-all; the first attempt needs authorization.
    ReplyAll,
    /// Send without a token prompts, then sends.
    AuthorizeSend,
    /// The send fails, the user retries from the same editor.
    SendFailureRetry,
    /// Typing past the threshold without the overlay dismisses it.
    KeypressDismiss,
    /// The editor pulls recipients from the page and checks their keys.
    RecipientKeys,
}

impl Scenario {
    /// Every scenario, in run order.
    pub const ALL: [Self; 8] = [
        Self::ComposeAndSend,
        Self::WriteBack,
        Self::Cancel,
        Self::ReplyAll,
        Self::AuthorizeSend,
        Self::SendFailureRetry,
        Self::KeypressDismiss,
        Self::RecipientKeys,
    ];

    /// Kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ComposeAndSend => "compose-and-send",
            Self::WriteBack => "write-back",
            Self::Cancel => "cancel",
            Self::ReplyAll => "reply-all",
            Self::AuthorizeSend => "authorize-send",
            Self::SendFailureRetry => "send-failure-retry",
            Self::KeypressDismiss => "keypress-dismiss",
            Self::RecipientKeys => "recipient-keys",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a scenario failed.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// A runtime stopped with an error.
    #[error("runtime failed: {0}")]
    Runtime(#[from] RuntimeError),

    /// The integration port could not be used.
    #[error("integration port failed: {0}")]
    Port(#[from] PortError),

    /// A runtime task panicked or was cancelled.
    #[error("runtime task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// An expected outcome did not happen.
    #[error("{scenario}: {message}")]
    Expectation {
        /// Scenario that failed.
        scenario: Scenario,
        /// What was expected.
        message: String,
    },

    /// The final state broke an invariant.
    #[error("invariants violated: {}", join_violations(.0))]
    Invariants(Vec<Violation>),
}

fn join_violations(violations: &[Violation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// What a finished scenario left behind.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario that ran.
    pub scenario: Scenario,
    /// Seed it ran with.
    pub seed: u64,
    /// Final state of the compose frame.
    pub frame: FrameSnapshot,
    /// Final state of the page.
    pub page: PageState,
    /// Everything the editor saw.
    pub editor: EditorLog,
    /// Messages the provider accepted.
    pub sent: Vec<OutgoingMail>,
    /// Authorization prompts shown.
    pub prompts: Vec<(String, ScopeSet)>,
    /// Virtual time the scenario took.
    pub elapsed: Duration,
}

/// Run `scenario` with `seed`.
///
/// # Errors
///
/// Returns [`ScenarioError`] if a runtime fails, an expected outcome is
/// missing or an invariant is violated.
pub async fn run(scenario: Scenario, seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let started = Instant::now();
    tracing::info!(%scenario, seed, "scenario starting");

    let report = match scenario {
        Scenario::ComposeAndSend => compose_and_send(seed).await?,
        Scenario::WriteBack => write_back(seed).await?,
        Scenario::Cancel => cancel(seed).await?,
        Scenario::ReplyAll => reply_all(seed).await?,
        Scenario::AuthorizeSend => authorize_send(seed).await?,
        Scenario::SendFailureRetry => send_failure_retry(seed).await?,
        Scenario::KeypressDismiss => keypress_dismiss(seed).await?,
        Scenario::RecipientKeys => recipient_keys(seed).await?,
    };
    let report = ScenarioReport { scenario, seed, elapsed: started.elapsed(), ..report };

    InvariantRegistry::standard()
        .check_all(&SystemSnapshot::default().with_frame(report.frame.clone()))
        .map_err(ScenarioError::Invariants)?;

    tracing::info!(%scenario, seed, sent = report.sent.len(), elapsed = ?report.elapsed, "scenario passed");
    Ok(report)
}

async fn compose_and_send(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::ComposeAndSend;
    let rig = Rig::start(seed, SimEditor::default());
    rig.transport.grant(ACCOUNT, ScopeSet::send());

    let host = SimHost::textarea("compose-1").signed_in(ACCOUNT);
    host.type_body("Meet at noon.");
    host.enter_recipients(&["alice@example.com"]);

    let frame = rig.open_frame(host);
    let controller = frame.controller.clone();
    frame.send(HostEvent::OverlayActivated).await;
    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    ensure(scenario, report.sent.len() == 1, "exactly one message sent")?;
    ensure(scenario, report.prompts.is_empty(), "no authorization prompt with a cached token")?;
    let sent_notice = report
        .editor
        .notifications_for(&controller)
        .iter()
        .any(|n| n.kind == NotificationKind::Success && n.message == SENT_MESSAGE);
    ensure(scenario, sent_notice, "success notification shown")?;
    ensure(scenario, report.editor.sessions.is_empty(), "editor session released")?;
    Ok(report)
}

async fn write_back(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::WriteBack;
    let rig = Rig::start(seed, SimEditor::default());

    let host = SimHost::textarea("compose-1");
    host.type_body("hello");
    host.enter_recipients(&["alice@example.com"]);

    let frame = rig.open_frame(host.clone());
    frame.send(HostEvent::OverlayActivated).await;
    let page = host.page();
    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    ensure(scenario, page.value == sim_armor("hello"), "ciphertext written into the textarea")?;
    let recipients = vec![Recipient::new("alice@example.com")];
    ensure(scenario, page.to == recipients, "recipients written back")?;
    ensure(scenario, page.input_events == 1, "one input event dispatched")?;
    ensure(scenario, !page.overlay_active, "overlay inactive after write-back")?;
    ensure(scenario, report.sent.is_empty(), "nothing sent through the provider")?;
    Ok(report)
}

async fn cancel(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::Cancel;
    let rig = Rig::start(seed, SimEditor::scripted([EditorOutcome::Cancel]));

    let host = SimHost::textarea("compose-1").signed_in(ACCOUNT);
    host.type_body("never mind");

    let frame = rig.open_frame(host.clone());
    frame.send(HostEvent::OverlayActivated).await;
    let page = host.page();
    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    ensure(scenario, page.value == "never mind", "page body untouched")?;
    ensure(scenario, !page.overlay_active, "overlay inactive after the session closed")?;
    ensure(scenario, report.editor.releases == 1, "session released once")?;
    ensure(scenario, report.sent.is_empty(), "nothing sent")?;
    Ok(report)
}

async fn reply_all(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::ReplyAll;
    let rig = Rig::start(seed, SimEditor::default());
    rig.transport.deliver(SourceMessage {
        message_id: "m1".into(),
        thread_id: Some("t1".into()),
        from: "Alice <alice@example.com>".into(),
        to: "bob@example.com, carol@example.com".into(),
        cc: "dave@example.com, Bob@Example.com".into(),
        subject: "Plans".into(),
        date: "Mon, 2 Mar 2026 10:00".into(),
        body: "See you there.".into(),
    });

    // The compose frame stays open the whole time, as on a real page.
    let frame = rig.open_frame(SimHost::rich_text("compose-1").signed_in(ACCOUNT));
    settle().await;

    let integration = rig.hub.connect(INTEGRATION_PORT)?;
    integration.emit(&Message::SecureReply {
        message_id: "m1".into(),
        include_all: true,
        account: ACCOUNT.into(),
    })?;
    settle().await;
    integration.disconnect();

    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    ensure(scenario, report.prompts.len() == 1, "one authorization prompt")?;
    let read_and_send = report.prompts.first().is_some_and(|(account, scopes)| {
        account == ACCOUNT && *scopes == ScopeSet::read_and_send()
    });
    ensure(scenario, read_and_send, "prompt asked for read and send")?;

    let request = report.editor.requests.first().map(|(_, r)| r.clone()).unwrap_or_default();
    ensure(scenario, request.subject.as_deref() == Some("Re: Plans"), "reply subject prefixed")?;
    let to_sender = request.recipients == vec![Recipient::named("alice@example.com", "Alice")];
    ensure(scenario, to_sender, "reply goes to the sender")?;
    let cc: Vec<_> = request.cc.iter().map(|r| r.email.as_str()).collect();
    ensure(scenario, cc == ["carol@example.com", "dave@example.com"], "reply-all copies the others")?;

    let raw =
        report.sent.first().map(|m| String::from_utf8_lossy(&m.raw).into_owned()).unwrap_or_default();
    ensure(scenario, report.sent.len() == 1, "reply sent")?;
    ensure(scenario, raw.contains("Cc: carol@example.com, dave@example.com\r\n"), "cc header")?;
    let thread = report.sent.first().and_then(|m| m.thread_id.as_deref());
    ensure(scenario, thread == Some("t1"), "reply filed into the thread")?;
    Ok(report)
}

async fn authorize_send(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::AuthorizeSend;
    let rig = Rig::start(seed, SimEditor::default());

    let host = SimHost::textarea("compose-1").signed_in(ACCOUNT);
    host.type_body("First mail from this browser.");
    host.enter_recipients(&["alice@example.com"]);

    let frame = rig.open_frame(host);
    frame.send(HostEvent::OverlayActivated).await;
    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    let send_prompt = vec![(ACCOUNT.to_owned(), ScopeSet::send())];
    ensure(scenario, report.prompts == send_prompt, "one send-scoped prompt")?;
    ensure(scenario, report.editor.requests.len() == 1, "encrypted once")?;
    ensure(scenario, report.sent.len() == 1, "sent after authorization")?;
    Ok(report)
}

async fn send_failure_retry(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::SendFailureRetry;
    let rig = Rig::start(seed, SimEditor::default());
    rig.transport.grant(ACCOUNT, ScopeSet::send());
    rig.transport.fail_next_send(TransportError::Network("connection reset".into()));

    let host = SimHost::textarea("compose-1").signed_in(ACCOUNT);
    host.type_body("Second try.");
    host.enter_recipients(&["alice@example.com"]);

    let frame = rig.open_frame(host);
    let controller = frame.controller.clone();
    frame.send(HostEvent::OverlayActivated).await;

    let after_failure = rig.editor.log();
    ensure(scenario, rig.transport.sent().is_empty(), "first send failed")?;
    ensure(scenario, after_failure.sessions.contains(&controller), "session kept after the failure")?;
    let sticky_error = after_failure
        .notifications
        .iter()
        .any(|(id, n, hide)| *id == controller && n.kind == NotificationKind::Error && hide.is_none());
    ensure(scenario, sticky_error, "error notification stays until dismissed")?;

    rig.retry(&controller).await;
    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;

    ensure(scenario, report.sent.len() == 1, "retry sent the message")?;
    ensure(scenario, report.editor.requests.len() == 1, "retry did not re-encrypt")?;
    ensure(scenario, report.editor.sessions.is_empty(), "session released after the retry")?;
    Ok(report)
}

async fn keypress_dismiss(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::KeypressDismiss;
    let rig = Rig::start(seed, SimEditor::default());
    let config = rig.config.clone();

    let host = SimHost::rich_text("compose-1");
    let frame = rig.open_frame(host.clone());

    for _ in 1..config.keypress_threshold {
        frame.send(HostEvent::Keypress).await;
    }
    let before = host.page();
    ensure(scenario, before.marker == Some(StatusMarker::Attached), "still attached below the threshold")?;
    ensure(scenario, before.overlays == 1, "overlay still mounted below the threshold")?;

    frame.send(HostEvent::Keypress).await;
    let after = host.page();
    ensure(scenario, after.marker.is_none(), "marker cleared at the threshold")?;
    ensure(scenario, after.overlays == 0, "overlay removed at the threshold")?;

    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;
    ensure(scenario, report.editor.requests.is_empty(), "editor never opened")?;
    Ok(report)
}

async fn recipient_keys(seed: u64) -> Result<ScenarioReport, ScenarioError> {
    let scenario = Scenario::RecipientKeys;
    let alice = KeyRef {
        user_id: "Alice <alice@example.com>".into(),
        key_id: "a1b2c3d4".into(),
        email: "alice@example.com".into(),
    };
    let rig = Rig::start(seed, SimEditor::default().with_keys([alice], true));

    let host = SimHost::textarea("compose-1").signed_in(ACCOUNT);
    host.enter_recipients(&["alice@example.com", "erin@example.com"]);

    let frame = rig.open_frame(host);
    let controller = frame.controller.clone();
    settle().await;
    rig.request_recipients(&controller).await;

    let log = rig.editor.log();
    let handed_over = log.recipients.iter().any(|(id, to)| {
        *id == controller && to.iter().map(|r| r.email.as_str()).eq(["alice@example.com", "erin@example.com"])
    });
    ensure(scenario, handed_over, "page recipients handed to the editor")?;
    let expected = [
        RecipientAction::ColorTag { email: "alice@example.com".into(), color: TagColor::Success },
        RecipientAction::LookupKeyOnServer { email: "erin@example.com".into() },
        RecipientAction::EncryptStatus { encrypt_disabled: true },
    ];
    ensure(
        scenario,
        log.recipient_actions_for(&controller).into_iter().eq(expected.iter()),
        "known key coloured, unknown address looked up, encrypt disabled",
    )?;

    let frame = frame.close().await?;
    let report = rig.finish(scenario, seed, &frame).await?;
    ensure(scenario, report.editor.requests.is_empty(), "editor never encrypted")?;
    Ok(report)
}

fn ensure(scenario: Scenario, condition: bool, message: &str) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Expectation { scenario, message: message.to_owned() })
    }
}

/// Let every task run until the system is quiet.
async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

/// Background runtime plus the simulated collaborators it talks to.
struct Rig {
    env: SimEnv,
    config: RuntimeConfig,
    hub: PortHub,
    editor: SimEditor,
    transport: SimTransport,
    authorizer: SimAuthorizer,
    handle: BackgroundHandle,
    background: JoinHandle<SimBackground>,
}

impl Rig {
    fn start(seed: u64, editor: SimEditor) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let latency = Duration::from_millis(rng.gen_range(0..MAX_LATENCY_MS));
        let think_time = Duration::from_millis(rng.gen_range(0..MAX_THINK_MS));
        tracing::debug!(seed, ?latency, ?think_time, "simulation timings");

        let env = SimEnv::with_seed(seed);
        let config = RuntimeConfig::default();
        let editor = editor.with_think_time(think_time);
        let transport = SimTransport::new().with_latency(latency);
        let authorizer = SimAuthorizer::new(transport.clone());

        let (hub, acceptor) = PortHub::new();
        let (background, handle) = Background::new(
            config.clone(),
            SimFormatter::default(),
            editor.clone(),
            transport.clone(),
            authorizer.clone(),
        );
        let background = tokio::spawn(background.run(acceptor));

        Self { env, config, hub, editor, transport, authorizer, handle, background }
    }

    /// Start a frame runtime on `host`.
    fn open_frame(&self, host: SimHost) -> FrameUnderTest {
        let id = FrameId::generate(&host.element_key(), &self.env);
        let controller = ControllerId::from_port_name(&id.port_name());
        let frame = Frame::new(id, host, self.config.frame_config(BodyFormat::Text));

        let (events, rx) = mpsc::channel(self.config.channel_capacity);
        let runtime = FrameRuntime::new(frame, self.hub.clone(), self.env.clone());
        let task = tokio::spawn(runtime.run(rx));
        FrameUnderTest { controller, events, task }
    }

    async fn request_recipients(&self, controller: &ControllerId) {
        if !self.handle.send(controller.clone(), ControllerEvent::RecipientsRequested).await {
            tracing::warn!(%controller, "background gone before recipients request");
        }
        settle().await;
    }

    async fn retry(&self, controller: &ControllerId) {
        if !self.handle.send(controller.clone(), ControllerEvent::Retry).await {
            tracing::warn!(%controller, "background gone before retry");
        }
        settle().await;
    }

    /// Wait for the background to drain and collect what happened.
    async fn finish(
        self,
        scenario: Scenario,
        seed: u64,
        frame: &Frame<SimHost>,
    ) -> Result<ScenarioReport, ScenarioError> {
        let Self { hub, editor, transport, authorizer, background, .. } = self;
        drop(hub);

        let background = background.await?;
        ensure(scenario, background.registry().is_empty(), "every controller removed")?;

        let editor = editor.log();
        ensure(scenario, editor.max_outstanding <= 1, "at most one encrypt call per controller")?;

        Ok(ScenarioReport {
            scenario,
            seed,
            frame: FrameSnapshot::of(frame),
            page: frame.host().page(),
            editor,
            sent: transport.sent(),
            prompts: authorizer.prompts(),
            elapsed: Duration::ZERO,
        })
    }
}

/// A running frame and the channel feeding it page events.
struct FrameUnderTest {
    controller: ControllerId,
    events: mpsc::Sender<HostEvent>,
    task: JoinHandle<Result<Frame<SimHost>, RuntimeError>>,
}

impl FrameUnderTest {
    /// Deliver a page event and wait for the system to go quiet.
    async fn send(&self, event: HostEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!(?event, "frame runtime already stopped");
        }
        settle().await;
    }

    /// Close the frame for good and wait for its runtime.
    async fn close(self) -> Result<Frame<SimHost>, ScenarioError> {
        if self.events.send(HostEvent::Close { final_close: true }).await.is_err() {
            tracing::debug!(controller = %self.controller, "frame already destroyed");
        }
        let frame = self.task.await??;
        settle().await;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Scenario::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Scenario::ALL.len());
    }
}
