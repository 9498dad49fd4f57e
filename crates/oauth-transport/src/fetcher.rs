//! Token acquisition strategies.
//!
//! A [`TokenFetcher`] is the only thing a
//! [`CredentialTransport`](crate::CredentialTransport) knows about how tokens
//! are obtained. Grant types (refresh token, client credentials, ...) live
//! behind this trait in the caller's code.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{OAuthError, Result};
use crate::token::Token;

/// Trait for obtaining a new token given the current one.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Fetch a new token.
    ///
    /// `current` is the token held at the time of the call and may be
    /// absent or expired. On failure no token is returned and the caller
    /// keeps whatever it held before.
    async fn fetch(&self, current: Option<&Token>) -> Result<Token>;
}

/// Shared token fetcher for use across async contexts.
pub type SharedTokenFetcher = Arc<dyn TokenFetcher>;

// ============================================================================
// Closure adapter
// ============================================================================

/// Adapts an async closure into a [`TokenFetcher`].
///
/// The closure receives an owned copy of the current token.
pub struct FnFetcher<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFetcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> TokenFetcher for FnFetcher<F>
where
    F: Fn(Option<Token>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Token>> + Send,
{
    async fn fetch(&self, current: Option<&Token>) -> Result<Token> {
        (self.f)(current.cloned()).await
    }
}

/// Wrap an async closure as a shared fetcher.
///
/// ```
/// use oauth_transport::{Token, fetcher_fn};
///
/// let fetcher = fetcher_fn(|current: Option<Token>| async move {
///     let refresh = current.map(|t| t.refresh_token).unwrap_or_default();
///     Ok(Token::new(format!("issued-for-{refresh}")))
/// });
/// # let _ = fetcher;
/// ```
pub fn fetcher_fn<F, Fut>(f: F) -> SharedTokenFetcher
where
    F: Fn(Option<Token>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    Arc::new(FnFetcher { f })
}

// ============================================================================
// StaticFetcher
// ============================================================================

/// Always hands out the same token. Useful for fixed API credentials.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    token: Token,
}

impl StaticFetcher {
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenFetcher for StaticFetcher {
    async fn fetch(&self, _current: Option<&Token>) -> Result<Token> {
        Ok(self.token.clone())
    }
}

// ============================================================================
// ScriptedFetcher (for testing)
// ============================================================================

/// Fetcher that replays queued results in order, for testing.
///
/// Records every token it was called with. Once the script runs out each
/// call fails with [`OAuthError::Refresh`].
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    results: Mutex<VecDeque<Result<Token>>>,
    seen: Mutex<Vec<Option<Token>>>,
    fetch_count: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that succeeds once per given token.
    pub fn with_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self::with_results(tokens.into_iter().map(Ok))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<Token>>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Queue another result.
    pub fn push(&self, result: Result<Token>) {
        self.results.lock().push_back(result);
    }

    /// Number of times `fetch` has been called.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// The `current` argument of every call so far.
    pub fn seen(&self) -> Vec<Option<Token>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl TokenFetcher for ScriptedFetcher {
    async fn fetch(&self, current: Option<&Token>) -> Result<Token> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(current.cloned());

        self.results.lock().pop_front().unwrap_or_else(|| {
            Err(OAuthError::Refresh(
                "ScriptedFetcher: script exhausted".to_string(),
            ))
        })
    }
}

#[async_trait]
impl<T: TokenFetcher + ?Sized> TokenFetcher for Arc<T> {
    async fn fetch(&self, current: Option<&Token>) -> Result<Token> {
        (**self).fetch(current).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_fetcher_receives_current_token() {
        let fetcher = fetcher_fn(|current: Option<Token>| async move {
            match current {
                Some(t) if !t.refresh_token.is_empty() => {
                    Ok(Token::new(format!("new-{}", t.refresh_token)))
                }
                _ => Err(OAuthError::Refresh("no refresh token".to_string())),
            }
        });

        let current = Token::new("old").with_refresh_token("r1");
        let token = fetcher.fetch(Some(&current)).await.unwrap();
        assert_eq!(token.access_token, "new-r1");

        let err = fetcher.fetch(None).await.unwrap_err();
        assert!(err.is_refresh_error());
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new(Token::new("fixed"));
        assert_eq!(fetcher.fetch(None).await.unwrap().access_token, "fixed");
        let stale = Token::new("stale");
        assert_eq!(
            fetcher.fetch(Some(&stale)).await.unwrap().access_token,
            "fixed"
        );
    }

    #[tokio::test]
    async fn test_scripted_fetcher_replays_in_order() {
        let fetcher = ScriptedFetcher::with_results([
            Ok(Token::new("first")),
            Err(OAuthError::Refresh("invalid_grant".to_string())),
        ]);

        assert_eq!(fetcher.fetch(None).await.unwrap().access_token, "first");
        assert_eq!(
            fetcher.fetch(None).await.unwrap_err(),
            OAuthError::Refresh("invalid_grant".to_string())
        );
        assert!(fetcher.fetch(None).await.unwrap_err().is_refresh_error());
        assert_eq!(fetcher.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_fetcher_records_inputs() {
        let fetcher = ScriptedFetcher::with_tokens([Token::new("a"), Token::new("b")]);
        let held = Token::new("a");
        fetcher.fetch(None).await.unwrap();
        fetcher.fetch(Some(&held)).await.unwrap();

        assert_eq!(fetcher.seen(), vec![None, Some(held)]);
    }
}
