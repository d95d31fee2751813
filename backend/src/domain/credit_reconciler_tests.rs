//! Tests for the credit reconciler.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::{
    MockAccountRepository, MockPaymentEventVerifier, MockPaymentProvider,
    MockPurchaseIntentRepository,
};
use crate::domain::{ErrorCode, IntentStatus, PaymentEvent, TokenBalance};
use crate::test_support::MutableClock;

fn u1() -> AccountIdentity {
    AccountIdentity::new("u1").expect("identity")
}

fn u2() -> AccountIdentity {
    AccountIdentity::new("u2").expect("identity")
}

fn i1() -> PurchaseIntentId {
    PurchaseIntentId::new("i1").expect("intent id")
}

fn account_with(identity: AccountIdentity, balance: i64) -> Account {
    Account::new(
        identity,
        "Ada",
        "ada@example.test",
        TokenBalance::from_stored(balance).expect("balance"),
    )
}

fn request() -> PurchaseRequest {
    PurchaseRequest::new(500, 999).expect("request")
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    let now = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    Arc::new(MutableClock::new(now))
}

fn pending_intent(clock: &MutableClock) -> PurchaseIntent {
    PurchaseIntent::pending(i1(), u1(), request(), clock.utc())
}

fn consumed_intent(clock: &MutableClock) -> PurchaseIntent {
    let mut intent = pending_intent(clock);
    intent.mark_consumed(clock.utc());
    intent
}

struct Mocks {
    intents: MockPurchaseIntentRepository,
    accounts: MockAccountRepository,
    payments: MockPaymentProvider,
    verifier: MockPaymentEventVerifier,
}

impl Mocks {
    fn new() -> Self {
        Self {
            intents: MockPurchaseIntentRepository::new(),
            accounts: MockAccountRepository::new(),
            payments: MockPaymentProvider::new(),
            verifier: MockPaymentEventVerifier::new(),
        }
    }

    fn build(self, clock: Arc<MutableClock>) -> CreditReconciler {
        CreditReconciler::new(
            Arc::new(self.intents),
            Arc::new(self.accounts),
            Arc::new(self.payments),
            Arc::new(self.verifier),
            clock,
            PurchaseRedirects {
                success_url: "http://localhost:4000/purchase/intent/{CHECKOUT_SESSION_ID}".into(),
                cancel_url: "http://localhost:4000/".into(),
            },
        )
    }
}

#[rstest]
#[tokio::test]
async fn initiate_records_a_pending_intent_keyed_by_provider_id(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks
        .payments
        .expect_create_checkout()
        .withf(|checkout: &CheckoutRequest| {
            checkout.client_reference == u1()
                && checkout.tokens == 500
                && checkout.amount_minor_units == 999
        })
        .times(1)
        .returning(|_| {
            Ok(InitiatedPurchase {
                intent_id: i1(),
                redirect_url: "https://pay.example/cs/i1".into(),
            })
        });
    mocks
        .intents
        .expect_insert()
        .withf(|intent: &PurchaseIntent| {
            intent.id() == &i1()
                && intent.identity() == &u1()
                && intent.tokens_requested().get() == 500
                && intent.status() == IntentStatus::Pending
        })
        .times(1)
        .returning(|_| Ok(()));
    let service = mocks.build(clock);

    let initiated = service
        .initiate_purchase(&u1(), request())
        .await
        .expect("initiated");
    assert_eq!(initiated.intent_id, i1());
    assert_eq!(initiated.redirect_url, "https://pay.example/cs/i1");
}

#[rstest]
#[tokio::test]
async fn provider_failure_records_nothing(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks
        .payments
        .expect_create_checkout()
        .returning(|_| Err(PaymentProviderError::transport("connection reset")));
    mocks.intents.expect_insert().never();
    let service = mocks.build(clock);

    let err = service
        .initiate_purchase(&u1(), request())
        .await
        .expect_err("provider failure");
    assert_eq!(err.code(), ErrorCode::ProviderError);
    assert_eq!(err.details().map(|d| d["provider"].clone()), Some("payment".into()));
}

#[rstest]
#[tokio::test]
async fn unknown_intent_never_credits(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks.intents.expect_find().returning(|_| Ok(None));
    mocks.intents.expect_redeem().never();
    let service = mocks.build(clock);

    let err = service
        .confirm_purchase(&i1(), &u1())
        .await
        .expect_err("unknown intent");
    assert_eq!(err.code(), ErrorCode::UnknownIntent);
}

#[rstest]
#[tokio::test]
async fn confirmation_by_another_account_is_rejected(clock: Arc<MutableClock>) {
    let intent = pending_intent(&clock);
    let mut mocks = Mocks::new();
    mocks
        .intents
        .expect_find()
        .returning(move |_| Ok(Some(intent.clone())));
    mocks.intents.expect_redeem().never();
    let service = mocks.build(clock);

    let err = service
        .confirm_purchase(&i1(), &u2())
        .await
        .expect_err("mismatch");
    assert_eq!(err.code(), ErrorCode::AccountMismatch);
}

#[rstest]
#[tokio::test]
async fn pending_intent_is_redeemed(clock: Arc<MutableClock>) {
    let intent = pending_intent(&clock);
    let now = clock.utc();
    let mut mocks = Mocks::new();
    mocks
        .intents
        .expect_find()
        .with(eq(i1()))
        .returning(move |_| Ok(Some(intent.clone())));
    mocks
        .intents
        .expect_redeem()
        .with(eq(i1()), eq(now))
        .times(1)
        .returning(|_, _| Ok(RedeemOutcome::Credited(account_with(u1(), 500))));
    let service = mocks.build(clock);

    let outcome = service
        .confirm_purchase(&i1(), &u1())
        .await
        .expect("credited");
    assert_eq!(outcome, ConfirmationOutcome::Credited(account_with(u1(), 500)));
}

#[rstest]
#[tokio::test]
async fn consumed_intent_returns_current_account_unchanged(clock: Arc<MutableClock>) {
    let intent = consumed_intent(&clock);
    let mut mocks = Mocks::new();
    mocks
        .intents
        .expect_find()
        .returning(move |_| Ok(Some(intent.clone())));
    mocks.intents.expect_redeem().never();
    mocks
        .accounts
        .expect_find()
        .with(eq(u1()))
        .returning(|_| Ok(Some(account_with(u1(), 490))));
    let service = mocks.build(clock);

    let outcome = service
        .confirm_purchase(&i1(), &u1())
        .await
        .expect("idempotent success");
    assert_eq!(
        outcome,
        ConfirmationOutcome::AlreadyConsumed(account_with(u1(), 490))
    );
}

#[rstest]
#[tokio::test]
async fn losing_a_redeem_race_is_idempotent_success(clock: Arc<MutableClock>) {
    let intent = pending_intent(&clock);
    let mut mocks = Mocks::new();
    mocks
        .intents
        .expect_find()
        .returning(move |_| Ok(Some(intent.clone())));
    mocks
        .intents
        .expect_redeem()
        .times(1)
        .returning(|_, _| Ok(RedeemOutcome::AlreadyRedeemed));
    mocks
        .accounts
        .expect_find()
        .returning(|_| Ok(Some(account_with(u1(), 500))));
    let service = mocks.build(clock);

    let outcome = service
        .confirm_purchase(&i1(), &u1())
        .await
        .expect("idempotent success");
    assert!(matches!(outcome, ConfirmationOutcome::AlreadyConsumed(_)));
}

#[rstest]
#[tokio::test]
async fn notification_without_signature_is_rejected(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks.verifier.expect_verify().never();
    let service = mocks.build(clock);

    let err = service
        .apply_payment_notification(b"{}", None)
        .await
        .expect_err("missing signature");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn forged_notification_is_rejected(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks
        .verifier
        .expect_verify()
        .returning(|_, _, _| Err(PaymentEventError::InvalidSignature));
    mocks.intents.expect_find().never();
    let service = mocks.build(clock);

    let err = service
        .apply_payment_notification(b"{}", Some("t=1,v1=00"))
        .await
        .expect_err("forged");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        err.details().map(|d| d["reason"].clone()),
        Some("invalid_signature".into())
    );
}

#[rstest]
#[tokio::test]
async fn unpaid_notification_is_acknowledged_without_credit(clock: Arc<MutableClock>) {
    let mut mocks = Mocks::new();
    mocks.verifier.expect_verify().returning(|_, _, _| {
        Ok(Some(PaymentEvent::new(i1(), u1(), PaymentStatus::Unpaid)))
    });
    mocks.intents.expect_find().never();
    let service = mocks.build(clock);

    let outcome = service
        .apply_payment_notification(b"{}", Some("t=1,v1=00"))
        .await
        .expect("acknowledged");
    assert!(outcome.is_none());
}

#[rstest]
#[tokio::test]
async fn paid_notification_confirms_for_the_client_reference(clock: Arc<MutableClock>) {
    let intent = pending_intent(&clock);
    let mut mocks = Mocks::new();
    mocks.verifier.expect_verify().returning(|_, _, _| {
        Ok(Some(PaymentEvent::new(i1(), u1(), PaymentStatus::Paid)))
    });
    mocks
        .intents
        .expect_find()
        .returning(move |_| Ok(Some(intent.clone())));
    mocks
        .intents
        .expect_redeem()
        .times(1)
        .returning(|_, _| Ok(RedeemOutcome::Credited(account_with(u1(), 500))));
    let service = mocks.build(clock);

    let outcome = service
        .apply_payment_notification(b"{}", Some("t=1,v1=00"))
        .await
        .expect("confirmed");
    assert_eq!(
        outcome,
        Some(ConfirmationOutcome::Credited(account_with(u1(), 500)))
    );
}

#[rstest]
#[tokio::test]
async fn intent_status_is_private_to_its_owner(clock: Arc<MutableClock>) {
    let intent = pending_intent(&clock);
    let mut mocks = Mocks::new();
    mocks
        .intents
        .expect_find()
        .returning(move |_| Ok(Some(intent.clone())));
    mocks.intents.expect_redeem().never();
    let service = mocks.build(clock);

    let err = service
        .intent_status(&i1(), &u2())
        .await
        .expect_err("not the owner");
    assert_eq!(err.code(), ErrorCode::AccountMismatch);
}
