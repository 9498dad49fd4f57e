//! Credential-injecting transport.
//!
//! [`CredentialTransport`] wraps a base [`Transport`], stamps an
//! `Authorization` header on every request and refreshes its token through a
//! [`TokenFetcher`] when the token is missing or expired.
//!
//! Validity is checked under the read lock so concurrent senders with a
//! valid token never contend. Refreshes take the write lock, so at most one
//! fetch is in flight per transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Request, Response};
use tokio::sync::RwLock;

use crate::error::{OAuthError, Result};
use crate::fetcher::{SharedTokenFetcher, TokenFetcher};
use crate::token::Token;
use crate::transport::{SharedTransport, Transport};

/// Transport that authorizes requests with a [`Token`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use oauth_transport::{CredentialTransport, Token, fetcher_fn};
///
/// # async fn example() -> oauth_transport::Result<()> {
/// let transport = CredentialTransport::builder()
///     .base(Arc::new(reqwest::Client::new()))
///     .fetcher(fetcher_fn(|_current| async { Ok(Token::new("fresh")) }))
///     .build()?;
///
/// let request = reqwest::Request::new(
///     reqwest::Method::GET,
///     "https://api.example.com/me".parse().unwrap(),
/// );
/// let response = transport.send(&request).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub struct CredentialTransport {
    base: SharedTransport,
    fetcher: SharedTokenFetcher,
    token: RwLock<Option<Token>>,
}

impl std::fmt::Debug for CredentialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTransport").finish_non_exhaustive()
    }
}

impl CredentialTransport {
    /// Create a transport around `base` that obtains tokens from `fetcher`.
    pub fn new(
        base: SharedTransport,
        fetcher: SharedTokenFetcher,
        token: Option<Token>,
    ) -> Self {
        Self {
            base,
            fetcher,
            token: RwLock::new(token),
        }
    }

    /// Create a new builder.
    pub fn builder() -> CredentialTransportBuilder {
        CredentialTransportBuilder::new()
    }

    /// Authorize a copy of `request` and send it through the base transport.
    ///
    /// The caller's request is left untouched. A streaming body cannot be
    /// copied and is rejected with [`OAuthError::InvalidRequest`]; hand the
    /// request over by value through [`Transport::send`] instead.
    ///
    /// A missing or expired token is refreshed once before sending. Callers
    /// that queued behind an in-progress refresh re-check the token and
    /// reuse the new one instead of fetching again.
    ///
    /// Responses are returned as-is, including 401s.
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let token = self.valid_token().await?;
        let request = clone_request(request)?;
        self.send_with(token, request).await
    }

    /// The token currently held.
    pub async fn current_token(&self) -> Option<Token> {
        self.token.read().await.clone()
    }

    /// Replace the held token, e.g. with one restored from a saved session.
    pub async fn set_token(&self, token: Token) {
        *self.token.write().await = Some(token);
    }

    /// Drop the held token. The next send fetches a new one.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Fetch a new token unconditionally.
    ///
    /// On failure the held token is kept so a later attempt can still use
    /// its refresh material.
    pub async fn refresh_token(&self) -> Result<()> {
        let mut guard = self.token.write().await;
        self.refresh_locked(&mut guard).await
    }

    /// Return a usable token, refreshing first if the held one is missing
    /// or expired.
    async fn valid_token(&self) -> Result<Token> {
        if let Some(token) = &*self.token.read().await {
            if !token.expired() {
                return Ok(token.clone());
            }
        }

        {
            let mut guard = self.token.write().await;
            // Another sender may have refreshed while we waited for the lock.
            let stale = (*guard).as_ref().is_none_or(Token::expired);
            if stale {
                self.refresh_locked(&mut guard).await?;
            }
        }

        self.current_token()
            .await
            .ok_or_else(|| OAuthError::Refresh("No token held after refresh".to_string()))
    }

    async fn refresh_locked(&self, held: &mut Option<Token>) -> Result<()> {
        tracing::debug!(has_token = held.is_some(), "Fetching new token");
        let token = self.fetcher.fetch(held.as_ref()).await?;
        tracing::debug!(
            expires_at = ?token.expiry,
            token_type = token.scheme(),
            "Token refreshed"
        );
        *held = Some(token);
        Ok(())
    }

    async fn send_with(&self, token: Token, mut request: Request) -> Result<Response> {
        token.set_auth_header(request.headers_mut())?;
        self.base.send(request).await
    }
}

// Owned requests need no copy: the caller has already given them up.
#[async_trait]
impl Transport for CredentialTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let token = self.valid_token().await?;
        self.send_with(token, request).await
    }
}

/// Copy a request so its headers can be changed without touching the
/// original. The body is shared, not re-read.
fn clone_request(request: &Request) -> Result<Request> {
    request.try_clone().ok_or_else(|| {
        OAuthError::InvalidRequest("Request body is a stream and cannot be copied".to_string())
    })
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating a [`CredentialTransport`].
#[derive(Default)]
pub struct CredentialTransportBuilder {
    base: Option<SharedTransport>,
    fetcher: Option<SharedTokenFetcher>,
    token: Option<Token>,
}

impl std::fmt::Debug for CredentialTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTransportBuilder")
            .field("base", &self.base.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("token", &self.token.is_some())
            .finish()
    }
}

impl CredentialTransportBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport requests are delegated to.
    pub fn base(mut self, base: SharedTransport) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the token fetcher.
    pub fn fetcher(mut self, fetcher: SharedTokenFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the token fetcher from a concrete value.
    pub fn fetcher_impl(self, fetcher: impl TokenFetcher + 'static) -> Self {
        self.fetcher(Arc::new(fetcher))
    }

    /// Set the initial token.
    pub fn token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<CredentialTransport> {
        let base = self
            .base
            .ok_or_else(|| OAuthError::Config("base transport is required".to_string()))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| OAuthError::Config("token fetcher is required".to_string()))?;

        Ok(CredentialTransport::new(base, fetcher, self.token))
    }
}
