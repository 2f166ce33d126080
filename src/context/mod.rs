//! Per-request context — the [`Baton`] handed to route handlers.
//!
//! A `Baton` is created by the router for exactly one request. It owns the
//! parsed [`Request`] and the [`ResponseWriter`] the response is rendered
//! into, and carries the authentication [`Token`] and the matched route.
//!
//! Query helpers return `Option`: `None` means the key is missing, its value
//! is empty, or (for numeric helpers) any element failed to parse.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::auth::Token;
use crate::http::{Method, Request, ResponseWriter, StatusCode};
use crate::responder::TemplateEngine;
use crate::router::pattern::Pattern;

pub mod scan;

pub use scan::{ScanError, ScanTarget, TargetKind};

/// Per-request façade over the request, the response writer, the matched
/// route and the authentication token.
pub struct Baton {
    request: Request,
    writer: ResponseWriter,
    route: Option<Arc<Pattern>>,
    token: Token,
    templates: Option<Arc<dyn TemplateEngine>>,
}

impl Baton {
    /// Create a baton for `request` on behalf of the identity in `token`.
    pub fn new(request: Request, token: Token) -> Self {
        Self {
            request,
            writer: ResponseWriter::new(),
            route: None,
            token,
            templates: None,
        }
    }

    #[must_use]
    pub(crate) fn with_templates(mut self, templates: Option<Arc<dyn TemplateEngine>>) -> Self {
        self.templates = templates;
        self
    }

    // Called once by the router after matching.
    pub(crate) fn set_route(&mut self, route: Arc<Pattern>) {
        debug_assert!(self.route.is_none(), "route set twice");
        self.route = Some(route);
    }

    pub(crate) fn into_parts(self) -> (Request, ResponseWriter) {
        (self.request, self.writer)
    }

    /// The request method (`GET`, `POST`, …).
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The path component of the request URL.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Returns `true` if the `Accept` header contains `content_type`.
    ///
    /// This is a plain substring check, so `accepts("json")` matches
    /// `application/json`.
    pub fn accepts(&self, content_type: &str) -> bool {
        self.request
            .headers()
            .get("accept")
            .is_some_and(|accept| accept.contains(content_type))
    }

    /// The first value for `key` from an urlencoded body, then the query string.
    pub fn form_value(&self, key: &str) -> Option<String> {
        self.request.form_value(key)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The underlying writer and request.
    pub fn raw(&mut self) -> (&mut ResponseWriter, &Request) {
        (&mut self.writer, &self.request)
    }

    pub fn writer(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// The identity resolved by the authenticator.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The format string of the matched route, e.g. `/api/site/%d/%s`.
    pub fn route_format(&self) -> Option<&str> {
        self.route.as_deref().map(Pattern::format)
    }

    /// The default template engine configured on the router, if any.
    pub fn template_engine(&self) -> Option<&Arc<dyn TemplateEngine>> {
        self.templates.as_ref()
    }

    /// Decode the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// A non-empty query string value.
    pub fn query_string(&self, key: &str) -> Option<&str> {
        self.request.query_param(key).filter(|v| !v.is_empty())
    }

    /// A comma separated query value, split into its parts.
    pub fn query_string_array(&self, key: &str) -> Option<Vec<&str>> {
        self.query_string(key).map(|v| v.split(',').collect())
    }

    /// `Some(true)` for `true`, `1` or `yes` (any case), `Some(false)` for any
    /// other present value.
    pub fn query_bool(&self, key: &str) -> Option<bool> {
        self.query_string(key).map(|v| {
            let v = v.to_ascii_lowercase();
            matches!(v.as_str(), "true" | "1" | "yes")
        })
    }

    pub fn query_uint(&self, key: &str) -> Option<u64> {
        self.query_string(key)?.parse().ok()
    }

    /// `key`'s value, or `default` when it is missing or not a `u64`.
    pub fn query_uint_or(&self, key: &str, default: u64) -> u64 {
        self.query_uint(key).unwrap_or(default)
    }

    pub fn query_uint_array(&self, key: &str) -> Option<Vec<u64>> {
        self.query_string_array(key)?
            .into_iter()
            .map(|v| v.parse().ok())
            .collect()
    }

    pub fn query_int_array(&self, key: &str) -> Option<Vec<i64>> {
        self.query_string_array(key)?
            .into_iter()
            .map(|v| v.parse().ok())
            .collect()
    }

    /// Bind the matched route's placeholders, in order, into `targets`.
    ///
    /// ```rust,no_run
    /// use baton::context::Baton;
    /// use baton::context::ScanError;
    ///
    /// // route "/api/site/%d/%s", path "/api/site/1/hello"
    /// fn handle(baton: &mut Baton) -> Result<(), ScanError> {
    ///     let mut site = 0_u64;
    ///     let mut page = String::new();
    ///     baton.scan(&mut [(&mut site).into(), (&mut page).into()])?;
    ///     assert_eq!((site, page.as_str()), (1, "hello"));
    ///     Ok(())
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`ScanError`]. Binding stops at the first failing destination.
    pub fn scan(&self, targets: &mut [ScanTarget<'_>]) -> Result<(), ScanError> {
        let route = self.route.as_deref().ok_or(ScanError::NoRoute)?;
        scan::bind(route, self.request.path(), targets)
    }

    /// Log `err`, then write `status` and the error text as the body.
    ///
    /// If the status was already committed the text is appended to whatever
    /// has been written.
    pub fn send_error(&mut self, err: impl std::fmt::Display, status: StatusCode) {
        let message = err.to_string();
        error!(
            path = %self.request.path(),
            status = status.as_u16(),
            error = %message,
            "sending error response"
        );
        self.writer.write_header(status);
        self.writer.put(message.as_bytes());
    }

    /// Encode `value` as JSON followed by a newline.
    ///
    /// Neither the status nor `Content-Type` is set; callers who need them set
    /// them on [`writer`](Self::writer) first.
    pub fn send_json<T>(&mut self, value: &T) -> Result<(), serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let mut encoded = serde_json::to_vec(value)?;
        encoded.push(b'\n');
        self.writer.put(&encoded);
        Ok(())
    }
}
