//! Tests for the session authenticator.

use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{MockAccountRepository, MockIdentityProvider, MockSessionRepository};
use crate::domain::{AccountIdentity, ErrorCode, TokenBalance};
use crate::test_support::MutableClock;

fn identity() -> AccountIdentity {
    AccountIdentity::new("u1").expect("identity")
}

fn account() -> Account {
    Account::new(identity(), "Ada", "ada@example.test", TokenBalance::ZERO)
}

fn profile() -> ExternalProfile {
    ExternalProfile::new(identity(), "Ada", "ada@example.test")
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    let now = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    Arc::new(MutableClock::new(now))
}

struct Mocks {
    accounts: MockAccountRepository,
    sessions: MockSessionRepository,
    identity: MockIdentityProvider,
}

impl Mocks {
    fn new() -> Self {
        Self {
            accounts: MockAccountRepository::new(),
            sessions: MockSessionRepository::new(),
            identity: MockIdentityProvider::new(),
        }
    }

    fn build(self, clock: Arc<MutableClock>) -> SessionAuthenticator {
        SessionAuthenticator::new(
            Arc::new(self.accounts),
            Arc::new(self.sessions),
            Arc::new(self.identity),
            clock,
        )
    }
}

#[rstest]
#[tokio::test]
async fn missing_cookie_is_unauthenticated_without_lookups(clock: Arc<MutableClock>) {
    let service = Mocks::new().build(clock);
    let resolution = service.resolve(None).await.expect("resolution");
    assert_eq!(resolution, SessionResolution::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn unknown_session_is_unauthenticated(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks.sessions.expect_find().times(1).returning(|_| Ok(None));
    let service = mocks.build(clock);

    let resolution = service
        .resolve(Some(&SessionId::generate()))
        .await
        .expect("resolution");
    assert_eq!(resolution, SessionResolution::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn active_session_resolves_to_its_account(clock: Arc<MutableClock>) {
    let session = Session::issue(identity(), clock.utc(), TimeDelta::hours(1));
    let id = session.id().clone();
    let mut mocks = Mocks::new();
    mocks
        .sessions
        .expect_find()
        .with(eq(id.clone()))
        .times(1)
        .returning(move |_| Ok(Some(session.clone())));
    mocks
        .accounts
        .expect_find()
        .with(eq(identity()))
        .times(1)
        .returning(|_| Ok(Some(account())));
    let service = mocks.build(clock);

    let resolution = service.resolve(Some(&id)).await.expect("resolution");
    assert_eq!(resolution, SessionResolution::Authenticated(account()));
}

#[rstest]
#[tokio::test]
async fn expired_session_is_deleted_and_unauthenticated(clock: Arc<MutableClock>) {
    let session = Session::issue(identity(), clock.utc(), TimeDelta::seconds(30));
    let id = session.id().clone();
    clock.advance_seconds(30);
    let mut mocks = Mocks::new();
    mocks
        .sessions
        .expect_find()
        .times(1)
        .returning(move |_| Ok(Some(session.clone())));
    mocks
        .sessions
        .expect_delete()
        .with(eq(id.clone()))
        .times(1)
        .returning(|_| Ok(()));
    let service = mocks.build(clock);

    let resolution = service.resolve(Some(&id)).await.expect("resolution");
    assert_eq!(resolution, SessionResolution::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn session_for_missing_account_is_unauthenticated(clock: Arc<MutableClock>) {
    let session = Session::issue(identity(), clock.utc(), TimeDelta::hours(1));
    let id = session.id().clone();
    let mut mocks = Mocks::new();
    mocks
        .sessions
        .expect_find()
        .returning(move |_| Ok(Some(session.clone())));
    mocks.accounts.expect_find().returning(|_| Ok(None));
    let service = mocks.build(clock);

    let resolution = service.resolve(Some(&id)).await.expect("resolution");
    assert_eq!(resolution, SessionResolution::Unauthenticated);
}

#[rstest]
#[tokio::test]
async fn begin_login_binds_a_fresh_session(clock: Arc<MutableClock>) {
    let now = clock.utc();
    let mut mocks = Mocks::new();
    mocks
        .accounts
        .expect_get_or_create()
        .with(eq(profile()))
        .times(1)
        .returning(|_| Ok(account()));
    mocks
        .sessions
        .expect_insert()
        .withf(move |session: &Session| {
            session.identity() == &identity() && session.expires_at() == now + TimeDelta::days(2)
        })
        .times(1)
        .returning(|_| Ok(()));
    let service = mocks.build(clock).with_ttl(TimeDelta::days(2));

    let outcome = service.begin_login(&profile()).await.expect("login");
    assert_eq!(outcome.account, account());
    assert_eq!(outcome.session.identity(), &identity());
}

#[rstest]
#[case(IdentityProviderError::auth_failed("bad code"), ErrorCode::Unauthenticated)]
#[case(IdentityProviderError::transport("dns"), ErrorCode::ProviderError)]
#[tokio::test]
async fn identity_provider_failures_do_not_create_sessions(
    clock: Arc<MutableClock>,
    #[case] failure: IdentityProviderError,
    #[case] expected: ErrorCode,
) {
    let mut mocks = Mocks::new();
    mocks
        .identity
        .expect_resolve()
        .times(1)
        .returning(move |_| Err(failure.clone()));
    let service = mocks.build(clock);

    let err = service.complete_login("code").await.expect_err("login fails");
    assert_eq!(err.code(), expected);
}

#[rstest]
#[tokio::test]
async fn end_login_is_idempotent(clock: Arc<MutableClock>) {
    let id = SessionId::generate();
    let mut mocks = Mocks::new();
    mocks
        .sessions
        .expect_delete()
        .with(eq(id.clone()))
        .times(2)
        .returning(|_| Ok(()));
    let service = mocks.build(clock);

    service.end_login(&id).await.expect("first logout");
    service.end_login(&id).await.expect("second logout");
}
