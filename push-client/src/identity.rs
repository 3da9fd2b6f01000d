//! Session identity forwarded to the push endpoint at handshake time.

use std::fmt;

use crate::error::IdentityError;

/// Numeric user id assigned by the backend.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct UserId(u64);

impl UserId {
    /// Create a user id, refusing zero.
    pub fn new(id: u64) -> Result<Self, IdentityError> {
        if id == 0 {
            return Err(IdentityError::ZeroUserId);
        }
        Ok(Self(id))
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque bearer token. `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, Eq, PartialEq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Validate and wrap a token.
    pub fn new(token: impl Into<String>) -> Result<Self, IdentityError> {
        let token = token.into();
        if token.is_empty() {
            return Err(IdentityError::EmptyToken);
        }
        if token
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(IdentityError::MalformedToken);
        }
        Ok(Self(token))
    }

    /// Raw token, for building the handshake request only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// The `(user id, token)` pair a push connection is bound to.
///
/// Two identities are equal only when both the user and the token match, so
/// a refreshed token counts as a new identity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionIdentity {
    user_id: UserId,
    token: BearerToken,
}

impl SessionIdentity {
    /// Validate both parts of an identity.
    pub fn new(user_id: u64, token: impl Into<String>) -> Result<Self, IdentityError> {
        Ok(Self {
            user_id: UserId::new(user_id)?,
            token: BearerToken::new(token)?,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn token(&self) -> &BearerToken {
        &self.token
    }
}
