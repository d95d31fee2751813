//! Session lifecycle: login, request resolution and logout.
//!
//! `NoSession -> Pending -> Active -> Ended`. The pending step (the OAuth
//! redirect and its `state` nonce) is held by the inbound adapter; this
//! service owns the transition into `Active` and back out of it.

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::ports::{
    AccountRepository, IdentityProvider, IdentityProviderError, SessionRepository,
};
use crate::domain::repository_errors::{map_account_error, map_session_error};
use crate::domain::{
    Account, Error, ExternalProfile, OAuthState, ProviderKind, Session, SessionId,
    SessionResolution,
};

/// Default lifetime of an issued session.
pub const DEFAULT_SESSION_TTL: TimeDelta = TimeDelta::days(30);

fn map_identity_error(error: IdentityProviderError) -> Error {
    match error {
        IdentityProviderError::AuthFailed { message } => {
            Error::unauthenticated(format!("login rejected: {message}"))
        }
        IdentityProviderError::Transport { message } => Error::provider(
            ProviderKind::Auth,
            format!("identity provider unavailable: {message}"),
        ),
    }
}

/// Session bound to an account after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub session: Session,
    pub account: Account,
}

/// Turns request credentials into accounts and manages session lifetime.
#[derive(Clone)]
pub struct SessionAuthenticator {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    identity_provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl SessionAuthenticator {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
        identity_provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            sessions,
            identity_provider,
            clock,
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Override the session lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve a presented session id to its account.
    ///
    /// Unknown, expired and orphaned sessions resolve to
    /// [`SessionResolution::Unauthenticated`]. An expired session is deleted
    /// on sight.
    pub async fn resolve(&self, session_id: Option<&SessionId>) -> Result<SessionResolution, Error> {
        let Some(session_id) = session_id else {
            return Ok(SessionResolution::Unauthenticated);
        };
        let Some(session) = self
            .sessions
            .find(session_id)
            .await
            .map_err(map_session_error)?
        else {
            return Ok(SessionResolution::Unauthenticated);
        };

        if session.is_expired(self.clock.utc()) {
            self.sessions
                .delete(session_id)
                .await
                .map_err(map_session_error)?;
            info!(identity = %session.identity(), "expired session ended");
            return Ok(SessionResolution::Unauthenticated);
        }

        match self
            .accounts
            .find(session.identity())
            .await
            .map_err(map_account_error)?
        {
            Some(account) => Ok(SessionResolution::Authenticated(account)),
            None => {
                warn!(identity = %session.identity(), "session bound to missing account");
                Ok(SessionResolution::Unauthenticated)
            }
        }
    }

    /// Consent URL for a login about to enter the pending state.
    pub fn authorization_url(&self, state: &OAuthState) -> String {
        self.identity_provider.authorization_url(state)
    }

    /// Exchange an OAuth code for a profile and log it in.
    pub async fn complete_login(&self, code: &str) -> Result<LoginOutcome, Error> {
        let profile = self
            .identity_provider
            .resolve(code)
            .await
            .map_err(map_identity_error)?;
        self.begin_login(&profile).await
    }

    /// Bind a fresh session to the profile's account, creating the account
    /// with a zero balance on first login.
    pub async fn begin_login(&self, profile: &ExternalProfile) -> Result<LoginOutcome, Error> {
        let account = self
            .accounts
            .get_or_create(profile)
            .await
            .map_err(map_account_error)?;
        let session = Session::issue(account.identity().clone(), self.clock.utc(), self.ttl);
        self.sessions
            .insert(&session)
            .await
            .map_err(map_session_error)?;
        info!(
            identity = %account.identity(),
            expires_at = %session.expires_at(),
            "session established"
        );
        Ok(LoginOutcome { session, account })
    }

    /// End a session. Ending an unknown or already-ended session is a no-op.
    pub async fn end_login(&self, session_id: &SessionId) -> Result<(), Error> {
        self.sessions
            .delete(session_id)
            .await
            .map_err(map_session_error)?;
        info!("session ended");
        Ok(())
    }

    /// Remove every expired session, returning the number removed.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        self.sessions
            .purge_expired(self.clock.utc())
            .await
            .map_err(map_session_error)
    }
}

#[cfg(test)]
#[path = "session_authenticator_tests.rs"]
mod tests;
