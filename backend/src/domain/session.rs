//! Session data model.
//!
//! A session binds an opaque, server-issued identifier to exactly one
//! [`AccountIdentity`] until `expires_at`. The client only ever holds the
//! identifier; the binding lives in a `SessionRepository`.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;

use super::{Account, AccountIdentity};

const SESSION_ID_BYTES: usize = 32;
const OAUTH_STATE_BYTES: usize = 16;

/// Validation errors for session primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    MalformedSessionId,
    MalformedOAuthState,
}

impl fmt::Display for SessionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSessionId => write!(f, "session id must be 64 lowercase hex characters"),
            Self::MalformedOAuthState => write!(f, "oauth state must be 32 lowercase hex characters"),
        }
    }
}

impl std::error::Error for SessionValidationError {}

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0_u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_lower_hex(value: &str, bytes: usize) -> bool {
    value.len() == bytes * 2
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Opaque 256-bit session token, hex encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_hex::<SESSION_ID_BYTES>())
    }

    /// Parse a token presented by a client or read from storage.
    pub fn parse(raw: &str) -> Result<Self, SessionValidationError> {
        if is_lower_hex(raw, SESSION_ID_BYTES) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(SessionValidationError::MalformedSessionId)
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

// Session ids are bearer credentials; keep them out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.0.get(..8).unwrap_or_default())
    }
}

/// Anti-forgery nonce carried through the OAuth redirect while a login is
/// pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthState(String);

impl OAuthState {
    pub fn generate() -> Self {
        Self(random_hex::<OAUTH_STATE_BYTES>())
    }

    pub fn parse(raw: &str) -> Result<Self, SessionValidationError> {
        if is_lower_hex(raw, OAUTH_STATE_BYTES) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(SessionValidationError::MalformedOAuthState)
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Verified profile returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    subject: AccountIdentity,
    display_name: String,
    email: String,
}

impl ExternalProfile {
    pub fn new(
        subject: AccountIdentity,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            display_name: display_name.into().trim().to_owned(),
            email: email.into().trim().to_owned(),
        }
    }

    pub fn subject(&self) -> &AccountIdentity {
        &self.subject
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// Server-side session record.
///
/// ## Invariants
/// - Bound to exactly one identity for its whole lifetime.
/// - Expired once `now >= expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    identity: AccountIdentity,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Issue a fresh session for `identity` valid for `ttl` from `now`.
    pub fn issue(identity: AccountIdentity, now: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            id: SessionId::generate(),
            identity,
            expires_at: now + ttl,
        }
    }

    /// Rebuild a stored session.
    pub fn restore(id: SessionId, identity: AccountIdentity, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            identity,
            expires_at,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of resolving a request credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResolution {
    Authenticated(Account),
    Unauthenticated,
}

impl SessionResolution {
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::Authenticated(account) => Some(account),
            Self::Unauthenticated => None,
        }
    }
}
