//! Stripe Checkout adapters: opening checkouts and verifying webhooks.

mod dto;
mod signature;
mod stripe_checkout;

pub use signature::{DEFAULT_SIGNATURE_TOLERANCE, StripeSignatureVerifier};
pub use stripe_checkout::{STRIPE_CHECKOUT_SESSIONS_URL, StripeCheckout, StripeCheckoutSettings};
