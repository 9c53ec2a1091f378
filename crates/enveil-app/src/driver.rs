//! Collaborator traits for the background runtime.
//!
//! The controllers never talk to the editor, the mail provider or the
//! authorization prompt directly. The [`crate::Background`] runtime executes
//! their actions against implementations of these traits, so the same
//! orchestration runs in production and in simulation.
//!
//! # Implementations
//!
//! - **Production**: editor dialog, provider REST client, OAuth prompt
//! - **Simulation**: scripted fakes in `enveil-harness`
//!
//! Implementations are cheap handles (`Clone`); each request runs on its own
//! clone so several controllers can wait on collaborators at once.

use std::{future::Future, time::Duration};

use enveil_controller::{
    AuthError, EditorError, EncryptOutput, Notification, OutgoingMail, SendReceipt, SourceMessage,
    TransportError,
};
use enveil_core::{AccessToken, ComposeRequest, ControllerId, Recipient, ScopeSet};

/// The editor dialog and its crypto engine.
///
/// Sessions are keyed by the owning controller. A controller holds at most
/// one session at a time.
pub trait EditorBackend: Clone + Send + Sync + 'static {
    /// Open (or reuse) the session for `controller`, prefill it from
    /// `request` and wait until the user encrypts or cancels.
    ///
    /// # Errors
    ///
    /// [`EditorError::Cancelled`] when the user closed the dialog,
    /// [`EditorError::Failed`] when encryption failed.
    fn encrypt(
        &self,
        controller: &ControllerId,
        request: ComposeRequest,
    ) -> impl Future<Output = Result<EncryptOutput, EditorError>> + Send;

    /// Bring the session of `controller` to the foreground.
    fn activate(&self, controller: &ControllerId);

    /// Show `notification` on the session of `controller`. Hide it after
    /// `hide_after` when set.
    fn notify(&self, controller: &ControllerId, notification: Notification, hide_after: Option<Duration>);

    /// Drop the session of `controller`.
    fn release(&self, controller: &ControllerId);

    /// Hand host page recipients to the session of `controller`.
    fn provide_recipients(&self, controller: &ControllerId, recipients: Vec<Recipient>);
}

/// The mail provider API.
pub trait MailTransport: Clone + Send + Sync + 'static {
    /// Cached, unexpired token for `account` covering `scopes`.
    ///
    /// `None` means the user has to authorize first.
    fn access_token(&self, account: &str, scopes: &ScopeSet) -> impl Future<Output = Option<AccessToken>> + Send;

    /// Fetch a message to reply to or forward.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the provider cannot be reached or the
    /// message does not exist.
    fn fetch(
        &self,
        account: &str,
        message_id: &str,
    ) -> impl Future<Output = Result<SourceMessage, TransportError>> + Send;

    /// Send a formatted message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the provider rejects the message.
    fn send(
        &self,
        mail: OutgoingMail,
        token: AccessToken,
    ) -> impl Future<Output = Result<SendReceipt, TransportError>> + Send;

    /// Forget every token of `account`.
    fn revoke(&self, account: &str) -> impl Future<Output = ()> + Send;
}

/// The interactive authorization prompt.
pub trait Authorizer: Clone + Send + Sync + 'static {
    /// Ask the user to grant `scopes` for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the user declines or the prompt fails.
    fn authorize(&self, account: &str, scopes: &ScopeSet) -> impl Future<Output = Result<(), AuthError>> + Send;
}
