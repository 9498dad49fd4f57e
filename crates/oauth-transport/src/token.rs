//! The credential attached to outgoing requests.
//!
//! A [`Token`] is a plain value: once handed to a
//! [`CredentialTransport`](crate::CredentialTransport) it is never mutated,
//! only replaced wholesale.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{OAuthError, Result};

/// Scheme used in the `Authorization` header when a token has no type.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Unix seconds of `0001-01-01T00:00:00Z`, the zero time some peers write
/// instead of omitting an unset expiry.
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.timestamp() == ZERO_TIME_UNIX && t.timestamp_subsec_nanos() == 0
}

fn deserialize_expiry<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let expiry = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(expiry.filter(|t| !is_zero_time(t)))
}

/// Provider-supplied metadata returned alongside a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Extra {
    /// Ordered string multi-map, as found in form-encoded token responses.
    Form(Vec<(String, String)>),
    /// Arbitrary JSON object, as found in JSON token responses.
    Json(serde_json::Map<String, serde_json::Value>),
}

impl Extra {
    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn from_form(body: &str) -> Self {
        Extra::Form(
            url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    /// Look up a string value.
    ///
    /// For form data the first value for `key` wins. For JSON, only string
    /// values are returned; numbers, objects and the like yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Extra::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Extra::Json(map) => map.get(key).and_then(|v| v.as_str()),
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Extra {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Extra::Json(map)
    }
}

/// Credentials used to authorize requests to a protected resource.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The value presented to the resource server. Empty means unusable.
    pub access_token: String,

    /// Authorization scheme, e.g. `Bearer` or `MAC`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,

    /// Material the fetcher may use to obtain a new access token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,

    /// When the access token stops being valid. `None` never expires; a
    /// serialized zero time reads back as `None`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_expiry"
    )]
    pub expiry: Option<DateTime<Utc>>,

    #[serde(skip)]
    extra: Option<Extra>,
}

// Credentials are redacted so tokens can be logged with `?token`.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &redact(&self.access_token))
            .field("token_type", &self.token_type)
            .field("refresh_token", &redact(&self.refresh_token))
            .field("expiry", &self.expiry)
            .field("extra", &self.extra.is_some())
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "[redacted]" }
}

impl Token {
    /// Create a token with only an access token set.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = refresh_token.into();
        self
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Set the expiry relative to now. Lifetimes too large to represent
    /// saturate at the latest representable instant.
    pub fn with_expires_in(mut self, lifetime: Duration) -> Self {
        let expiry = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expiry = Some(expiry);
        self
    }

    /// Attach provider metadata.
    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Returns an extra field returned by the provider, or `""` when there
    /// is none.
    ///
    /// ```
    /// use oauth_transport::{Extra, Token};
    ///
    /// let token = Token::new("abc").with_extra(Extra::from_form("id_token=xyz"));
    /// assert_eq!(token.extra("id_token"), "xyz");
    /// assert_eq!(token.extra("missing"), "");
    /// ```
    pub fn extra(&self, key: &str) -> &str {
        self.extra
            .as_ref()
            .and_then(|extra| extra.get(key))
            .unwrap_or("")
    }

    /// True if there is no access token or it has expired.
    pub fn expired(&self) -> bool {
        self.expired_at(Utc::now())
    }

    /// Same as [`expired`](Self::expired), evaluated at `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expiry {
            Some(expiry) if !is_zero_time(&expiry) => expiry < now,
            _ => false,
        }
    }

    pub fn valid(&self) -> bool {
        !self.expired()
    }

    /// The authorization scheme, falling back to [`DEFAULT_TOKEN_TYPE`].
    pub fn scheme(&self) -> &str {
        if self.token_type.is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            &self.token_type
        }
    }

    /// The full `Authorization` header value: `"<scheme> <access_token>"`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.scheme(), self.access_token)
    }

    /// Parse a token from its JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the JSON wire shape. Extra metadata is not included.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the `Authorization` header, replacing any existing value.
    pub fn set_auth_header(&self, headers: &mut HeaderMap) -> Result<()> {
        let mut value = HeaderValue::from_str(&self.authorization_value()).map_err(|_| {
            OAuthError::InvalidRequest("Token contains invalid header characters".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}
