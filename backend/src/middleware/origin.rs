//! Origin allow-list admission.
//!
//! Requests carrying an `Origin` header outside the configured list are
//! refused with `403 forbidden` before reaching a handler. Requests without
//! an `Origin` (same-origin navigation, server-to-server webhooks) pass
//! through untouched. Admitted cross-origin responses echo the origin and
//! allow credentials so the session cookie travels.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::http::header::{self, HeaderMap, HeaderValue};
use actix_web::{Error, HttpResponse, ResponseError};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::warn;
use url::Url;

use crate::domain;

const PREFLIGHT_MAX_AGE_SECS: &str = "600";
const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginParseError {
    #[error("origin `{value}` is not a valid URL: {message}")]
    InvalidUrl { value: String, message: String },
    #[error("origin `{value}` must use http, https or a browser extension scheme")]
    UnsupportedScheme { value: String },
    #[error("origin `{value}` must be scheme://host[:port] without a path")]
    NotAnOrigin { value: String },
}

/// Validated set of origins allowed to call the API from a browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedOrigins(Arc<BTreeSet<String>>);

impl AllowedOrigins {
    /// Parse a comma separated list. Blank entries are skipped.
    ///
    /// # Examples
    /// ```
    /// use tokengate::middleware::AllowedOrigins;
    ///
    /// let origins = AllowedOrigins::parse("https://app.example.com, http://localhost:3000")
    ///     .expect("valid origins");
    /// assert!(origins.admits("http://localhost:3000"));
    /// assert!(!origins.admits("https://evil.example.com"));
    /// ```
    pub fn parse(list: &str) -> Result<Self, OriginParseError> {
        Self::from_entries(list.split(','))
    }

    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, OriginParseError> {
        let origins = entries
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(normalise)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self(Arc::new(origins)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether a raw `Origin` header value is on the list.
    pub fn admits(&self, origin: &str) -> bool {
        normalise(origin).is_ok_and(|origin| self.0.contains(&origin))
    }
}

/// Browser extension schemes. `url` serialises their origins as `"null"`,
/// so they are compared as literal `scheme://id` strings.
const EXTENSION_SCHEMES: [&str; 2] = ["chrome-extension", "moz-extension"];

fn normalise(value: &str) -> Result<String, OriginParseError> {
    let url = Url::parse(value).map_err(|err| OriginParseError::InvalidUrl {
        value: value.to_owned(),
        message: err.to_string(),
    })?;
    let extension = EXTENSION_SCHEMES.contains(&url.scheme());
    if !extension && !matches!(url.scheme(), "http" | "https") {
        return Err(OriginParseError::UnsupportedScheme {
            value: value.to_owned(),
        });
    }
    let bare = matches!(url.path(), "" | "/")
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    let not_an_origin = || OriginParseError::NotAnOrigin {
        value: value.to_owned(),
    };
    let host = url.host_str().filter(|host| !host.is_empty()).ok_or_else(not_an_origin)?;
    if !bare {
        return Err(not_an_origin());
    }
    if extension {
        if url.port().is_some() {
            return Err(not_an_origin());
        }
        return Ok(format!("{}://{}", url.scheme(), host.to_ascii_lowercase()));
    }
    Ok(url.origin().ascii_serialization())
}

/// Middleware enforcing an [`AllowedOrigins`] list.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use tokengate::middleware::{AllowedOrigins, OriginGate};
///
/// let origins = AllowedOrigins::parse("https://app.example.com").expect("origins");
/// let app = App::new().wrap(OriginGate::new(origins));
/// ```
#[derive(Clone)]
pub struct OriginGate {
    allowed: AllowedOrigins,
}

impl OriginGate {
    pub fn new(allowed: AllowedOrigins) -> Self {
        Self { allowed }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OriginGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = OriginGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OriginGateMiddleware {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct OriginGateMiddleware<S> {
    service: Rc<S>,
    allowed: AllowedOrigins,
}

impl<S, B> Service<ServiceRequest> for OriginGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .map(|value| value.to_str().map(str::to_owned));

        let origin = match origin {
            None => {
                let fut = self.service.call(req);
                return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
            }
            Some(Ok(origin)) if self.allowed.admits(&origin) => origin,
            Some(_) => {
                warn!(path = %req.path(), "request from disallowed origin refused");
                let response = domain::Error::forbidden("origin not allowed").error_response();
                return Box::pin(ready(Ok(req.into_response(response).map_into_right_body())));
            }
        };

        if req.method() == Method::OPTIONS {
            let requested_headers = req
                .headers()
                .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
                .cloned();
            let mut response = HttpResponse::NoContent().finish();
            let headers = response.headers_mut();
            apply_cors_headers(headers, &origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                requested_headers.unwrap_or(HeaderValue::from_static("content-type")),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
            );
            return Box::pin(ready(Ok(req.into_response(response).map_into_right_body())));
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            apply_cors_headers(res.headers_mut(), &origin);
            Ok(res.map_into_left_body())
        })
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}
