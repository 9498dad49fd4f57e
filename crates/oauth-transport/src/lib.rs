//! Credential-injecting HTTP transport for OAuth 2.0 clients.
//!
//! Wraps a base transport, attaches an `Authorization` header to every
//! outgoing request and refreshes the token when it is missing or expired.
//! How tokens are obtained is left to a pluggable [`TokenFetcher`].
//!
//! # Components
//!
//! - [`token`]: the token value, its expiry rules and provider metadata
//! - [`fetcher`]: the token acquisition contract and stock fetchers
//! - [`transport`]: the base transport contract, `reqwest` support, mocks
//! - [`credential`]: the decorating transport and its builder

pub mod credential;
pub mod error;
pub mod fetcher;
pub mod token;
pub mod transport;

pub use credential::{CredentialTransport, CredentialTransportBuilder};
pub use error::{OAuthError, Result};
pub use fetcher::{
    FnFetcher, ScriptedFetcher, SharedTokenFetcher, StaticFetcher, TokenFetcher, fetcher_fn,
};
pub use token::{DEFAULT_TOKEN_TYPE, Extra, Token};
pub use transport::{MockTransport, RecordedRequest, SharedTransport, Transport};
