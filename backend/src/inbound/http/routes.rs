//! Route table shared by the server and handler tests.

use actix_web::web;

use super::{account, completion, purchases, sessions};

/// Register every business endpoint. Health probes and API docs are
/// mounted by the server.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/session")
            .service(sessions::login)
            .service(sessions::login_callback_redirect)
            .service(sessions::login_callback)
            .service(sessions::logout),
    )
    .service(
        web::scope("/account")
            .service(account::balance)
            .service(account::me),
    )
    .service(
        web::scope("/purchase")
            .service(purchases::create_intent)
            .service(purchases::intent_status)
            .service(purchases::confirm)
            .service(purchases::cancelled),
    )
    .service(completion::complete);
}
