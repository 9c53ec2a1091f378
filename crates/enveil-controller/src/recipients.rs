//! Recipient input sync.
//!
//! The editor's recipient tag input is updated by pushing a
//! [`RecipientSnapshot`] into [`RecipientInput::update`]. Nothing is shared:
//! the input keeps its own copy and answers with the actions the owning view
//! has to carry out (colour a tag, look a key up on the key server, toggle
//! encryption).

use enveil_core::address::same_address;

/// A public key known to the local keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    /// Primary user id, e.g. `Alice <a@x.com>`.
    pub user_id: String,
    /// Key id, hex.
    pub key_id: String,
    /// Address the key is bound to.
    pub email: String,
}

/// One recipient tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientEntry {
    /// Address; filled from `display_id` after manual input.
    pub email: String,
    /// Text shown in the tag.
    pub display_id: String,
    /// Key found for the address.
    pub key: Option<KeyRef>,
    /// A key server lookup was already requested.
    pub checked_server: bool,
}

impl RecipientEntry {
    /// Entry typed by the user.
    pub fn typed(display_id: impl Into<String>) -> Self {
        Self { display_id: display_id.into(), ..Self::default() }
    }

    /// Entry picked from autocomplete.
    pub fn picked(email: impl Into<String>) -> Self {
        Self { email: email.into(), ..Self::default() }
    }
}

/// State pushed by the owning view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSnapshot {
    /// Current tags.
    pub recipients: Vec<RecipientEntry>,
    /// Keys available locally.
    pub keys: Vec<KeyRef>,
    /// Trust on first use: look unknown addresses up on the key server.
    pub tofu: bool,
}

/// Tag colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagColor {
    /// A key was found.
    Success,
    /// No key.
    Danger,
}

/// What the owning view must do after an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientAction {
    /// Colour the tag for `email`.
    ColorTag {
        /// Tag address.
        email: String,
        /// Colour.
        color: TagColor,
    },
    /// Ask the key server for `email`'s key.
    LookupKeyOnServer {
        /// Address to look up.
        email: String,
    },
    /// Enable or disable the encrypt button.
    EncryptStatus {
        /// True when some recipient lacks a key or there are none.
        encrypt_disabled: bool,
    },
}

/// An autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Address inserted when picked.
    pub email: String,
    /// `user id - KEYID`.
    pub display_id: String,
}

/// The recipient input's own state.
#[derive(Debug, Clone, Default)]
pub struct RecipientInput {
    snapshot: RecipientSnapshot,
}

impl RecipientInput {
    /// Empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipients after the last update, verified.
    pub fn recipients(&self) -> &[RecipientEntry] {
        &self.snapshot.recipients
    }

    /// Replace the state with `snapshot`, verify every recipient and report
    /// the encrypt status.
    pub fn update(&mut self, snapshot: RecipientSnapshot) -> Vec<RecipientAction> {
        self.snapshot = snapshot;

        let mut actions = Vec::new();
        let keys = &self.snapshot.keys;
        let tofu = self.snapshot.tofu;
        for recipient in &mut self.snapshot.recipients {
            actions.extend(verify(recipient, keys, tofu));
        }
        actions.push(self.encrypt_status());
        actions
    }

    /// Suggestions whose display id contains `query`, ignoring case, minus
    /// addresses already entered.
    pub fn autocomplete(&self, query: &str) -> Vec<Suggestion> {
        let query = query.to_lowercase();
        self.snapshot
            .keys
            .iter()
            .map(|key| Suggestion {
                email: key.email.clone(),
                display_id: format!("{} - {}", key.user_id, key.key_id.to_uppercase()),
            })
            .filter(|s| s.display_id.to_lowercase().contains(&query))
            .filter(|s| !self.snapshot.recipients.iter().any(|r| r.email == s.email))
            .collect()
    }

    fn encrypt_status(&self) -> RecipientAction {
        let recipients = &self.snapshot.recipients;
        let missing_key = recipients.iter().any(|r| r.key.is_none());
        RecipientAction::EncryptStatus { encrypt_disabled: missing_key || recipients.is_empty() }
    }
}

fn verify(recipient: &mut RecipientEntry, keys: &[KeyRef], tofu: bool) -> Option<RecipientAction> {
    if recipient.email.is_empty() {
        recipient.email.clone_from(&recipient.display_id);
    } else {
        recipient.display_id.clone_from(&recipient.email);
    }
    if recipient.email.is_empty() {
        return None;
    }

    recipient.key = keys.iter().find(|key| same_address(&key.email, &recipient.email)).cloned();

    if recipient.key.is_some() || recipient.checked_server || !tofu {
        let color = if recipient.key.is_some() { TagColor::Success } else { TagColor::Danger };
        return Some(RecipientAction::ColorTag { email: recipient.email.clone(), color });
    }

    recipient.checked_server = true;
    Some(RecipientAction::LookupKeyOnServer { email: recipient.email.clone() })
}
