//! OAuth scopes and access-token cache.
//!
//! Token storage belongs to the mail transport. The cache here is what a
//! transport keeps in memory: tokens keyed by account and scope set, expired
//! on the environment clock. A miss is a normal outcome that sends the
//! controller through the authorization gate.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

/// Well-known scopes.
pub mod scopes {
    /// Send mail on the user's behalf.
    pub const GMAIL_SEND: &str = "https://www.googleapis.com/auth/gmail.send";
    /// Read messages and metadata.
    pub const GMAIL_READONLY: &str = "https://www.googleapis.com/auth/gmail.readonly";
}

/// An ordered set of OAuth scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// Set from scope strings.
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(scopes.into_iter().map(Into::into).collect())
    }

    /// Scopes needed to send.
    pub fn send() -> Self {
        Self::new([scopes::GMAIL_SEND])
    }

    /// Scopes needed to read a message and reply to it.
    pub fn read_and_send() -> Self {
        Self::new([scopes::GMAIL_READONLY, scopes::GMAIL_SEND])
    }

    /// Whether every scope in `other` is granted by `self`.
    pub fn covers(&self, other: &ScopeSet) -> bool {
        other.0.is_subset(&self.0)
    }

    /// Iterate scopes in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A bearer token for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Raw bearer value.
    pub value: String,
    /// Scopes the token was granted for.
    pub scopes: ScopeSet,
}

impl AccessToken {
    /// New token.
    pub fn new(value: impl Into<String>, scopes: ScopeSet) -> Self {
        Self { value: value.into(), scopes }
    }
}

/// Masks the bearer value: first 4 chars then `***`.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.value.chars().take(4).collect();
        f.debug_struct("AccessToken")
            .field("value", &format_args!("{visible}***"))
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken<I> {
    token: AccessToken,
    expires_at: I,
}

/// In-memory token cache keyed by `(account, scopes)`.
///
/// Accounts compare case-insensitively.
#[derive(Debug, Clone)]
pub struct TokenCache<I> {
    entries: HashMap<(String, ScopeSet), CachedToken<I>>,
}

impl<I> Default for TokenCache<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> TokenCache<I> {
    /// Empty cache.
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Number of cached tokens, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every token of `account`. Returns how many were dropped.
    pub fn revoke(&mut self, account: &str) -> usize {
        let account = account.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|(owner, _), _| *owner != account);
        before - self.entries.len()
    }
}

impl<I: Copy + Ord> TokenCache<I> {
    /// Cache `token` for `account` until `expires_at`.
    pub fn insert(&mut self, account: &str, token: AccessToken, expires_at: I) {
        let key = (account.to_ascii_lowercase(), token.scopes.clone());
        self.entries.insert(key, CachedToken { token, expires_at });
    }

    /// A live token for `account` granting at least `scopes`.
    ///
    /// An exact scope match is preferred; otherwise any token whose scopes
    /// cover the request is returned.
    pub fn get(&self, account: &str, scopes: &ScopeSet, now: I) -> Option<&AccessToken> {
        let account = account.to_ascii_lowercase();
        let live = |cached: &&CachedToken<I>| cached.expires_at > now;

        if let Some(cached) = self.entries.get(&(account.clone(), scopes.clone())).filter(live) {
            return Some(&cached.token);
        }

        self.entries
            .iter()
            .filter(|((owner, granted), _)| *owner == account && granted.covers(scopes))
            .map(|(_, cached)| cached)
            .find(live)
            .map(|cached| &cached.token)
    }

    /// Drop expired tokens. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: I) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.expires_at > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str, scopes: ScopeSet) -> AccessToken {
        AccessToken::new(value, scopes)
    }

    #[test]
    fn exact_scope_hit() {
        let mut cache = TokenCache::new();
        cache.insert("b@x.com", token("t1", ScopeSet::send()), 100u64);

        assert_eq!(cache.get("B@X.com", &ScopeSet::send(), 10).map(|t| t.value.as_str()), Some("t1"));
    }

    #[test]
    fn broader_token_covers_narrower_request() {
        let mut cache = TokenCache::new();
        cache.insert("b@x.com", token("wide", ScopeSet::read_and_send()), 100u64);

        assert_eq!(
            cache.get("b@x.com", &ScopeSet::send(), 10).map(|t| t.value.as_str()),
            Some("wide")
        );
        assert!(cache.get("b@x.com", &ScopeSet::new(["other"]), 10).is_none());
    }

    #[test]
    fn expired_tokens_miss_and_purge() {
        let mut cache = TokenCache::new();
        cache.insert("b@x.com", token("t1", ScopeSet::send()), 100u64);

        assert!(cache.get("b@x.com", &ScopeSet::send(), 100).is_none());
        assert_eq!(cache.purge_expired(100), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn revoke_drops_only_that_account() {
        let mut cache = TokenCache::new();
        cache.insert("b@x.com", token("t1", ScopeSet::send()), 100u64);
        cache.insert("b@x.com", token("t2", ScopeSet::read_and_send()), 100u64);
        cache.insert("c@x.com", token("t3", ScopeSet::send()), 100u64);

        assert_eq!(cache.revoke("B@x.com"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn debug_masks_bearer_value() {
        let rendered = format!("{:?}", token("ya29.secret-value", ScopeSet::send()));
        assert!(rendered.contains("ya29***"));
        assert!(!rendered.contains("secret-value"));
    }
}
