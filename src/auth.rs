//! Bearer credential passed explicitly into every authenticated operation.
//!
//! The core never reads ambient session state; whoever owns the login flow
//! hands a `Credential` in. This keeps the chat core testable without a
//! session store and makes credential refresh the caller's decision.

/// Opaque bearer token for the history feed and the channel handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, as sent in the channel handshake.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// The `Authorization` header value for request/response calls.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    // Tokens must never land in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;
