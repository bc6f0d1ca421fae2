//! Bearer token cache and provider
//!
//! The cache holds the most recently obtained [`AuthToken`] behind an
//! `ArcSwapOption`, so concurrent requests read it without locking. Refresh is
//! check-then-act: a caller that sees no token or an expired one asks the
//! [`AuthTokenProvider`] for a new token and stores it unconditionally.
//! Concurrent callers that all observe an expired token may each call the
//! provider; the last store wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use web_time::SystemTime;

use crate::error::Error;
use crate::request::HttpClientRequest;

/// Bearer token and its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    token: String,
    expires_at: SystemTime,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthToken {
    /// Token valid until `expires_at`
    pub fn new(token: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Token valid for `valid_for` from now
    pub fn valid_for(token: impl Into<String>, valid_for: Duration) -> Self {
        Self::new(token, SystemTime::now() + valid_for)
    }

    /// Token value
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry instant
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// A token is usable only while the current time is before its expiry
    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// Obtains bearer tokens for the context
///
/// The provider receives a request with auth injection already skipped, so it
/// can call a token endpoint through the same context without recursing.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    /// Obtain a fresh token
    async fn obtain_token(&self, request: HttpClientRequest) -> Result<AuthToken, Error>;
}

/// Atomically swapped holder of the current token
#[derive(Default)]
pub struct AuthTokenCache {
    current: ArcSwapOption<AuthToken>,
}

impl fmt::Debug for AuthTokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokenCache")
            .field("current", &self.current.load_full())
            .finish()
    }
}

impl AuthTokenCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, expired or not
    pub fn current(&self) -> Option<Arc<AuthToken>> {
        self.current.load_full()
    }

    /// Current token if it has not expired
    pub fn valid(&self) -> Option<Arc<AuthToken>> {
        self.current().filter(|token| !token.is_expired())
    }

    /// Store `token` unconditionally, returning the previous one
    pub fn replace(&self, token: AuthToken) -> Option<Arc<AuthToken>> {
        self.current.swap(Some(Arc::new(token)))
    }

    /// Store `token` only if the cache still holds `expected`
    ///
    /// Returns `true` when the swap happened.
    pub fn compare_and_swap(&self, expected: &Option<Arc<AuthToken>>, token: AuthToken) -> bool {
        let previous = self
            .current
            .compare_and_swap(expected, Some(Arc::new(token)));
        match (&*previous, expected) {
            (Some(previous), Some(expected)) => Arc::ptr_eq(previous, expected),
            (None, None) => true,
            _ => false,
        }
    }

    /// Drop the cached token
    pub fn clear(&self) {
        self.current.store(None);
    }

    /// Return a valid token, refreshing through `provider` when absent or expired
    pub(crate) async fn get_or_refresh(
        &self,
        provider: &dyn AuthTokenProvider,
        request: impl FnOnce() -> HttpClientRequest,
    ) -> Result<Arc<AuthToken>, Error> {
        if let Some(token) = self.valid() {
            return Ok(token);
        }

        tracing::debug!("Auth token absent or expired, obtaining a new one");
        let token = Arc::new(provider.obtain_token(request()).await?);
        self.current.store(Some(token.clone()));
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let valid = AuthToken::valid_for("abc", Duration::from_secs(60));
        assert!(!valid.is_expired());
        assert_eq!(valid.token(), "abc");

        let expired = AuthToken::new("old", SystemTime::now() - Duration::from_secs(1));
        assert!(expired.is_expired());
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AuthToken::valid_for("secret-value", Duration::from_secs(60));
        assert!(!format!("{token:?}").contains("secret-value"));
    }

    #[test]
    fn test_valid_skips_expired_token() {
        let cache = AuthTokenCache::new();
        assert!(cache.valid().is_none());

        cache.replace(AuthToken::new(
            "old",
            SystemTime::now() - Duration::from_secs(1),
        ));
        assert!(cache.current().is_some());
        assert!(cache.valid().is_none());

        let previous = cache.replace(AuthToken::valid_for("new", Duration::from_secs(60)));
        assert_eq!(previous.expect("Previous token").token(), "old");
        assert_eq!(cache.valid().expect("Valid token").token(), "new");

        cache.clear();
        assert!(cache.current().is_none());
    }

    #[test]
    fn test_compare_and_swap() {
        let cache = AuthTokenCache::new();
        let observed = cache.current();
        assert!(cache.compare_and_swap(
            &observed,
            AuthToken::valid_for("first", Duration::from_secs(60))
        ));

        // Stale observation loses
        assert!(!cache.compare_and_swap(
            &observed,
            AuthToken::valid_for("second", Duration::from_secs(60))
        ));
        assert_eq!(cache.current().expect("Token").token(), "first");

        let observed = cache.current();
        assert!(cache.compare_and_swap(
            &observed,
            AuthToken::valid_for("third", Duration::from_secs(60))
        ));
        assert_eq!(cache.current().expect("Token").token(), "third");
    }
}
