//! Simulated mail provider and authorization prompt.
//!
//! [`SimTransport`] keeps tokens in a [`TokenCache`] on virtual time, serves
//! messages from an in-memory mailbox and records what was sent. Scripted
//! failures are consumed one per send. [`SimAuthorizer`] grants tokens into
//! the same transport, so a successful prompt makes the next token lookup
//! succeed.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use enveil_app::{Authorizer, MailTransport};
use enveil_controller::{AuthError, OutgoingMail, SendReceipt, SourceMessage, TransportError};
use enveil_core::{AccessToken, ScopeSet, TokenCache};
use tokio::time::Instant;

/// Lifetime of a granted token.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug)]
struct TransportState {
    tokens: TokenCache<Instant>,
    mailbox: HashMap<String, SourceMessage>,
    sent: Vec<(OutgoingMail, AccessToken)>,
    send_failures: VecDeque<TransportError>,
    revoked: Vec<String>,
    issued: u64,
    latency: Duration,
}

/// Shared handle to the simulated provider.
#[derive(Debug, Clone)]
pub struct SimTransport {
    state: Arc<Mutex<TransportState>>,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTransport {
    /// Empty provider: no tokens, no messages.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                tokens: TokenCache::new(),
                mailbox: HashMap::new(),
                sent: Vec::new(),
                send_failures: VecDeque::new(),
                revoked: Vec::new(),
                issued: 0,
                latency: Duration::ZERO,
            })),
        }
    }

    /// Virtual time every request takes.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Store a message that can be fetched.
    pub fn deliver(&self, message: SourceMessage) {
        self.lock().mailbox.insert(message.message_id.clone(), message);
    }

    /// Issue a token for `account` valid for [`TOKEN_LIFETIME`].
    pub fn grant(&self, account: &str, scopes: ScopeSet) {
        let mut state = self.lock();
        state.issued += 1;
        let token = AccessToken::new(format!("sim-token-{}", state.issued), scopes);
        state.tokens.insert(account, token, Instant::now() + TOKEN_LIFETIME);
    }

    /// Fail the next send with `error`.
    pub fn fail_next_send(&self, error: TransportError) {
        self.lock().send_failures.push_back(error);
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.lock().sent.iter().map(|(mail, _)| mail.clone()).collect()
    }

    /// Accounts revoked so far.
    pub fn revoked(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn round_trip(&self) {
        let latency = self.lock().latency;
        tokio::time::sleep(latency).await;
    }
}

impl MailTransport for SimTransport {
    async fn access_token(&self, account: &str, scopes: &ScopeSet) -> Option<AccessToken> {
        self.lock().tokens.get(account, scopes, Instant::now()).cloned()
    }

    async fn fetch(&self, _account: &str, message_id: &str) -> Result<SourceMessage, TransportError> {
        self.round_trip().await;
        self.lock()
            .mailbox
            .get(message_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound { message_id: message_id.to_owned() })
    }

    async fn send(&self, mail: OutgoingMail, token: AccessToken) -> Result<SendReceipt, TransportError> {
        self.round_trip().await;
        let mut state = self.lock();
        if let Some(error) = state.send_failures.pop_front() {
            return Err(error);
        }
        state.sent.push((mail, token));
        Ok(SendReceipt { message_id: format!("sent-{}", state.sent.len()) })
    }

    async fn revoke(&self, account: &str) {
        let mut state = self.lock();
        state.tokens.revoke(account);
        state.revoked.push(account.to_owned());
    }
}

/// Scripted authorization prompt.
///
/// Outcomes are consumed in order; an empty script approves.
#[derive(Debug, Clone)]
pub struct SimAuthorizer {
    transport: SimTransport,
    script: Arc<Mutex<VecDeque<Result<(), AuthError>>>>,
    prompts: Arc<Mutex<Vec<(String, ScopeSet)>>>,
}

impl SimAuthorizer {
    /// Prompt granting tokens into `transport`.
    pub fn new(transport: SimTransport) -> Self {
        Self { transport, script: Arc::default(), prompts: Arc::default() }
    }

    /// Answer the next prompt with `outcome`.
    pub fn push(&self, outcome: Result<(), AuthError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<(String, ScopeSet)> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }
}

impl Authorizer for SimAuthorizer {
    async fn authorize(&self, account: &str, scopes: &ScopeSet) -> Result<(), AuthError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((account.to_owned(), scopes.clone()));
        }
        let outcome = self.script.lock().ok().and_then(|mut script| script.pop_front()).unwrap_or(Ok(()));

        if outcome.is_ok() {
            self.transport.grant(account, scopes.clone());
        }
        outcome
    }
}
