//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only talk to the domain
//! services it carries.

use crate::domain::{CompletionDispatcher, CreditReconciler, SessionAuthenticator};

/// Where the browser lands after a login callback completes.
pub const DEFAULT_AFTER_LOGIN_URL: &str = "/";

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub authenticator: SessionAuthenticator,
    pub reconciler: CreditReconciler,
    pub dispatcher: CompletionDispatcher,
    pub after_login_url: String,
}

impl HttpState {
    pub fn new(
        authenticator: SessionAuthenticator,
        reconciler: CreditReconciler,
        dispatcher: CompletionDispatcher,
    ) -> Self {
        Self {
            authenticator,
            reconciler,
            dispatcher,
            after_login_url: DEFAULT_AFTER_LOGIN_URL.to_owned(),
        }
    }

    pub fn with_after_login_url(mut self, url: impl Into<String>) -> Self {
        self.after_login_url = url.into();
        self
    }
}
