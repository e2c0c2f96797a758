//! Bearer token wrapper
//!
//! The token is opaque to the client. It is only ever placed in the
//! `Authorization` header of HTTP requests and in the `token` query parameter
//! of channel URLs, and it is never written to logs.

use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token. Blank input yields `None` so that absent credentials
    /// can never open a channel.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}
