//! Scripted editor dialog.
//!
//! Each `encrypt` call takes the next [`EditorOutcome`] from the script; an
//! empty script encrypts whatever the request prefilled. The editor records
//! every call so tests can check that a controller never had two encrypt
//! calls outstanding at once.
//!
//! Recipients handed over by a controller go through a per-controller
//! [`RecipientInput`] checked against the editor's keyring, the same way the
//! real recipient field colours its tags.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use enveil_app::EditorBackend;
use enveil_controller::{
    EditorError, EncryptOutput, Notification,
    recipients::{KeyRef, RecipientAction, RecipientEntry, RecipientInput, RecipientSnapshot},
};
use enveil_core::{
    ComposeRequest, ControllerId, Recipient,
    armor::{BEGIN_MARKER, END_MARKER},
};

/// How the simulated user finishes one editor session.
#[derive(Debug, Clone)]
pub enum EditorOutcome {
    /// Encrypt what the request prefilled.
    Encrypt,
    /// Encrypt with this exact output.
    EncryptWith(EncryptOutput),
    /// Close the dialog.
    Cancel,
    /// Crypto failure.
    Fail(String),
}

/// What the editor saw.
#[derive(Debug, Clone, Default)]
pub struct EditorLog {
    /// Every encrypt request, in order.
    pub requests: Vec<(ControllerId, ComposeRequest)>,
    /// Controllers whose session is currently held.
    pub sessions: HashSet<ControllerId>,
    /// Encrypt calls currently outstanding, per controller.
    pub outstanding: HashMap<ControllerId, usize>,
    /// Highest outstanding count any controller reached.
    pub max_outstanding: usize,
    /// `activate` calls.
    pub activations: usize,
    /// `release` calls.
    pub releases: usize,
    /// Notifications shown, with their hide delay.
    pub notifications: Vec<(ControllerId, Notification, Option<Duration>)>,
    /// Recipients handed over.
    pub recipients: Vec<(ControllerId, Vec<Recipient>)>,
    /// What the recipient field did with them.
    pub recipient_actions: Vec<(ControllerId, RecipientAction)>,
}

impl EditorLog {
    /// Notifications shown to `controller`.
    pub fn notifications_for(&self, controller: &ControllerId) -> Vec<&Notification> {
        self.notifications.iter().filter(|(id, ..)| id == controller).map(|(_, n, _)| n).collect()
    }

    /// Recipient field actions for `controller`.
    pub fn recipient_actions_for(&self, controller: &ControllerId) -> Vec<&RecipientAction> {
        self.recipient_actions.iter().filter(|(id, _)| id == controller).map(|(_, a)| a).collect()
    }
}

#[derive(Debug, Default)]
struct EditorState {
    script: VecDeque<EditorOutcome>,
    think_time: Duration,
    keys: Vec<KeyRef>,
    tofu: bool,
    inputs: HashMap<ControllerId, RecipientInput>,
    log: EditorLog,
}

/// Shared handle to the scripted editor.
#[derive(Debug, Clone, Default)]
pub struct SimEditor {
    state: Arc<Mutex<EditorState>>,
}

impl SimEditor {
    /// Editor answering with `outcomes` in order.
    pub fn scripted(outcomes: impl IntoIterator<Item = EditorOutcome>) -> Self {
        let editor = Self::default();
        editor.lock().script.extend(outcomes);
        editor
    }

    /// Virtual time the user spends in each session.
    #[must_use]
    pub fn with_think_time(self, think_time: Duration) -> Self {
        self.lock().think_time = think_time;
        self
    }

    /// Keys in the local keyring. With `tofu`, recipients without a key are
    /// looked up on the key server.
    #[must_use]
    pub fn with_keys(self, keys: impl IntoIterator<Item = KeyRef>, tofu: bool) -> Self {
        {
            let mut state = self.lock();
            state.keys.extend(keys);
            state.tofu = tofu;
        }
        self
    }

    /// Queue more outcomes.
    pub fn push(&self, outcome: EditorOutcome) {
        self.lock().script.push_back(outcome);
    }

    /// Copy of the log.
    pub fn log(&self) -> EditorLog {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Stand-in ciphertext for `text`.
pub fn sim_armor(text: &str) -> String {
    let body: String = text.chars().rev().collect();
    format!("{BEGIN_MARKER}\n\n{body}\n{END_MARKER}")
}

fn encrypt_request(request: ComposeRequest) -> EncryptOutput {
    let plaintext = request.text.or(request.quoted_mail).unwrap_or_default();
    EncryptOutput {
        armored: sim_armor(&plaintext),
        attachments: Vec::new(),
        subject: request.subject.unwrap_or_default(),
        to: request.recipients,
        cc: request.cc,
    }
}

impl EditorBackend for SimEditor {
    async fn encrypt(
        &self,
        controller: &ControllerId,
        request: ComposeRequest,
    ) -> Result<EncryptOutput, EditorError> {
        let (outcome, think_time) = {
            let mut state = self.lock();
            state.log.requests.push((controller.clone(), request.clone()));
            state.log.sessions.insert(controller.clone());

            let outstanding = state.log.outstanding.entry(controller.clone()).or_default();
            *outstanding += 1;
            let current = *outstanding;
            state.log.max_outstanding = state.log.max_outstanding.max(current);

            (state.script.pop_front().unwrap_or(EditorOutcome::Encrypt), state.think_time)
        };

        tokio::time::sleep(think_time).await;

        {
            let mut state = self.lock();
            if let Some(outstanding) = state.log.outstanding.get_mut(controller) {
                *outstanding = outstanding.saturating_sub(1);
            }
        }

        match outcome {
            EditorOutcome::Encrypt => Ok(encrypt_request(request)),
            EditorOutcome::EncryptWith(output) => Ok(output),
            EditorOutcome::Cancel => Err(EditorError::Cancelled),
            EditorOutcome::Fail(reason) => Err(EditorError::Failed(reason)),
        }
    }

    fn activate(&self, _controller: &ControllerId) {
        self.lock().log.activations += 1;
    }

    fn notify(&self, controller: &ControllerId, notification: Notification, hide_after: Option<Duration>) {
        self.lock().log.notifications.push((controller.clone(), notification, hide_after));
    }

    fn release(&self, controller: &ControllerId) {
        let mut state = self.lock();
        state.log.sessions.remove(controller);
        state.log.releases += 1;
    }

    fn provide_recipients(&self, controller: &ControllerId, recipients: Vec<Recipient>) {
        let mut state = self.lock();
        let snapshot = RecipientSnapshot {
            recipients: recipients.iter().map(|r| RecipientEntry::picked(r.email.clone())).collect(),
            keys: state.keys.clone(),
            tofu: state.tofu,
        };
        let actions = state.inputs.entry(controller.clone()).or_default().update(snapshot);

        let log = &mut state.log;
        log.recipients.push((controller.clone(), recipients));
        log.recipient_actions.extend(actions.into_iter().map(|action| (controller.clone(), action)));
    }
}

#[cfg(test)]
mod tests {
    use enveil_controller::recipients::TagColor;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn script_runs_in_order_then_encrypts_request() {
        let editor = SimEditor::scripted([EditorOutcome::Cancel]);
        let id = ControllerId::new("1");
        let request = ComposeRequest { text: Some("hi".into()), ..ComposeRequest::default() };

        assert_eq!(editor.encrypt(&id, request.clone()).await, Err(EditorError::Cancelled));

        let output = editor.encrypt(&id, request).await.unwrap();
        assert!(output.armored.starts_with(BEGIN_MARKER));
        assert!(output.armored.contains("ih"));

        let log = editor.log();
        assert_eq!(log.requests.len(), 2);
        assert_eq!(log.max_outstanding, 1);
    }

    #[test]
    fn provided_recipients_are_checked_against_keyring() {
        let alice = KeyRef {
            user_id: "Alice <alice@example.com>".into(),
            key_id: "a1b2".into(),
            email: "alice@example.com".into(),
        };
        let editor = SimEditor::default().with_keys([alice], false);
        let id = ControllerId::new("1");

        editor.provide_recipients(&id, vec![Recipient::new("Alice@Example.com"), Recipient::new("erin@example.com")]);

        let log = editor.log();
        assert_eq!(log.recipients.len(), 1);
        assert_eq!(
            log.recipient_actions_for(&id),
            vec![
                &RecipientAction::ColorTag { email: "Alice@Example.com".into(), color: TagColor::Success },
                &RecipientAction::ColorTag { email: "erin@example.com".into(), color: TagColor::Danger },
                &RecipientAction::EncryptStatus { encrypt_disabled: true },
            ]
        );
    }

    #[test]
    fn release_ends_session() {
        let editor = SimEditor::default();
        let id = ControllerId::new("1");
        editor.lock().log.sessions.insert(id.clone());

        editor.release(&id);
        assert!(editor.log().sessions.is_empty());
        assert_eq!(editor.log().releases, 1);
    }
}
