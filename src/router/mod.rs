//! Request routing — match paths against typed patterns and dispatch.
//!
//! A [`Router`] owns an ordered table of routes. Each route pairs a format
//! string (see [`pattern`]) with an async handler that receives the request's
//! [`Baton`] and returns a [`Responder`]:
//!
//! | Format            | Example match        | Scan destinations     |
//! |-------------------|----------------------|-----------------------|
//! | `/sites`          | `/sites`             | *(none)*              |
//! | `/sites/%d`       | `/sites/42`          | `u32` or `u64`        |
//! | `/sites/%d/%s`    | `/sites/42/settings` | integer, then string  |
//!
//! Dispatch runs in a fixed order: authenticate, build the baton, pick the
//! first route (in registration order) whose pattern matches the whole path,
//! run its handler, render its responder. Overlapping patterns are resolved
//! purely by registration order; there is no specificity ranking. Requests no
//! route matches go to the fallback handler untouched.
//!
//! Routes are registered through `&mut Router` before serving starts; once the
//! router is shared (typically behind an [`Arc`]) the table is read-only.

use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::auth::Authenticator;
use crate::context::Baton;
use crate::http::{Request, Response, StatusCode};
use crate::responder::{Responder, TemplateEngine};
use crate::BoxError;

pub mod pattern;

pub use pattern::{Pattern, PatternError};

/// Where unauthenticated requests are redirected unless configured otherwise.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Body sent when the authenticator itself fails.
pub const UNKNOWN_ERROR_BODY: &str = "Unknown Error";

/// What a route handler produces.
pub type HandlerResult = Result<Box<dyn Responder>, BoxError>;

/// A boxed, `Send` future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An async route handler.
///
/// Implemented for every `async fn(&mut Baton) -> HandlerResult`, which is how
/// handlers are normally written:
///
/// ```rust,no_run
/// use baton::context::Baton;
/// use baton::responder::{Responder, Text};
/// use baton::router::HandlerResult;
///
/// async fn show_site(baton: &mut Baton) -> HandlerResult {
///     let mut id = 0_u64;
///     baton.scan(&mut [(&mut id).into()])?;
///     Ok(Text::new(format!("site {id}")).boxed())
/// }
/// ```
pub trait Handler<'a>: Send + Sync + 'static {
    type Future: Future<Output = HandlerResult> + Send + 'a;

    fn call(&self, baton: &'a mut Baton) -> Self::Future;
}

impl<'a, F, Fut> Handler<'a> for F
where
    F: Fn(&'a mut Baton) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'a,
{
    type Future = Fut;

    fn call(&self, baton: &'a mut Baton) -> Fut {
        (self)(baton)
    }
}

// Object-safe form of `Handler` stored in the route table.
trait ErasedHandler: Send + Sync {
    fn call<'a>(&'a self, baton: &'a mut Baton) -> BoxFuture<'a, HandlerResult>;
}

struct HandlerFn<H>(H);

impl<H> ErasedHandler for HandlerFn<H>
where
    H: for<'a> Handler<'a>,
{
    fn call<'a>(&'a self, baton: &'a mut Baton) -> BoxFuture<'a, HandlerResult> {
        Box::pin(Handler::call(&self.0, baton))
    }
}

/// A plain request handler: takes ownership of the [`Request`] and resolves to
/// a [`Response`]. Used for the router's fallback and accepted by
/// [`Server::run`](crate::server::Server::run).
pub trait RequestHandler: Send + Sync + 'static {
    fn call(&self, request: Request) -> BoxFuture<'static, Response>;
}

impl<T, F> RequestHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, Response> {
        Box::pin((self)(request))
    }
}

// A registered route. The pattern is shared with every baton it matches.
struct Route {
    pattern: Arc<Pattern>,
    handler: Box<dyn ErasedHandler>,
}

/// Ordered route table with an authentication gate in front of it.
///
/// # Examples
///
/// ```rust,no_run
/// use baton::auth::{AuthError, Token};
/// use baton::context::Baton;
/// use baton::responder::{Responder, Text};
/// use baton::router::{HandlerResult, Router};
/// use baton::{Request, Response, StatusCode};
///
/// async fn hello(baton: &mut Baton) -> HandlerResult {
///     let mut name = String::new();
///     baton.scan(&mut [(&mut name).into()])?;
///     Ok(Text::new(format!("hello {name}")).boxed())
/// }
///
/// # fn main() -> Result<(), baton::router::PatternError> {
/// let auth = |_req: &Request| -> Result<Option<Token>, AuthError> { Ok(Some(Token::new(()))) };
/// let mut router = Router::new(auth, |_req: Request| async {
///     Response::new(StatusCode::NOT_FOUND)
/// });
/// router.add_route("/hello/%s", hello)?;
/// assert_eq!(router.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Router {
    routes: Vec<Route>,
    authenticator: Arc<dyn Authenticator>,
    fallback: Arc<dyn RequestHandler>,
    login_path: String,
    templates: Option<Arc<dyn TemplateEngine>>,
}

impl Router {
    /// Create a router with no routes.
    ///
    /// Both collaborators are mandatory: every request is authenticated, and
    /// every request that matches no route is handed to `fallback`.
    pub fn new(authenticator: impl Authenticator + 'static, fallback: impl RequestHandler) -> Self {
        Self {
            routes: Vec::new(),
            authenticator: Arc::new(authenticator),
            fallback: Arc::new(fallback),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            templates: None,
        }
    }

    /// Redirect unauthenticated requests to `path` instead of `/login`.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Engine used by [`Template`](crate::responder::Template) responders that
    /// do not carry their own.
    #[must_use]
    pub fn with_template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.templates = Some(engine);
        self
    }

    /// Compile `format` and append a route for it.
    ///
    /// Routes are tried in the order they are added.
    ///
    /// # Errors
    ///
    /// [`PatternError::Invalid`] if `format` does not compile. This is a
    /// start-up error: nothing is registered.
    pub fn add_route<H>(&mut self, format: &str, handler: H) -> Result<(), PatternError>
    where
        H: for<'a> Handler<'a>,
    {
        let pattern = Pattern::compile(format)?;
        debug!(format, index = self.routes.len(), "route registered");
        self.routes.push(Route {
            pattern: Arc::new(pattern),
            handler: Box::new(HandlerFn(handler)),
        });
        Ok(())
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Handle one request end to end.
    ///
    /// Never fails: every outcome, including authenticator, handler and
    /// responder errors, becomes a response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let response = self.dispatch_inner(request).await;

        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed = ?start.elapsed(),
            "request completed"
        );
        response
    }

    async fn dispatch_inner(&self, request: Request) -> Response {
        let token = match self.authenticator.authenticate(&request).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!(path = %request.path(), "no session token, redirecting to login");
                return Response::new(StatusCode::TEMPORARY_REDIRECT)
                    .header("Location", self.login_path.as_str());
            }
            Err(e) => {
                error!(path = %request.path(), error = %e, "authentication failed");
                return Response::new(StatusCode::INTERNAL_SERVER_ERROR).body(UNKNOWN_ERROR_BODY);
            }
        };

        let mut baton = Baton::new(request, token).with_templates(self.templates.clone());

        let Some(route) = self
            .routes
            .iter()
            .find(|route| route.pattern.is_match(baton.path()))
        else {
            let (request, _) = baton.into_parts();
            debug!(path = %request.path(), "no route matched, using fallback");
            return self.fallback.call(request).await;
        };

        baton.set_route(Arc::clone(&route.pattern));

        match route.handler.call(&mut baton).await {
            Ok(responder) => {
                if let Err(e) = responder.respond(&mut baton) {
                    baton.send_error(&e, StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
            Err(e) => baton.send_error(&e, StatusCode::INTERNAL_SERVER_ERROR),
        }

        let (_, writer) = baton.into_parts();
        writer.into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::auth::{AuthError, Token};
    use crate::responder::{Redirect, RespondError, Text};

    fn make_request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn signed_in(_req: &Request) -> Result<Option<Token>, AuthError> {
        Ok(Some(Token::new("user-1".to_owned())))
    }

    async fn not_found(_req: Request) -> Response {
        Response::new(StatusCode::NOT_FOUND).body("fallback")
    }

    fn router() -> Router {
        Router::new(signed_in, not_found)
    }

    fn body(res: &Response) -> &str {
        std::str::from_utf8(res.content()).unwrap()
    }

    async fn first(_b: &mut Baton) -> HandlerResult {
        Ok(Text::new("first").boxed())
    }

    async fn second(_b: &mut Baton) -> HandlerResult {
        Ok(Text::new("second").boxed())
    }

    async fn site(b: &mut Baton) -> HandlerResult {
        let mut id = 0_u64;
        let mut page = String::new();
        b.scan(&mut [(&mut id).into(), (&mut page).into()])?;
        Ok(Text::new(format!("{id}:{page}")).boxed())
    }

    async fn wrong_arity(b: &mut Baton) -> HandlerResult {
        let mut id = 0_u64;
        b.scan(&mut [(&mut id).into()])?;
        Ok(Text::new("unreachable").boxed())
    }

    async fn whoami(b: &mut Baton) -> HandlerResult {
        let user = b
            .token()
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        Ok(Text::new(user).boxed())
    }

    async fn saved_then_failed(b: &mut Baton) -> HandlerResult {
        b.writer().write_header(StatusCode::ACCEPTED);
        b.send_json(&serde_json::json!({ "saved": 1 }))?;
        Err("quota exceeded".into())
    }

    async fn go_next(b: &mut Baton) -> HandlerResult {
        let next = b.query_string("next").unwrap_or("/").to_owned();
        Ok(Redirect::to(next).boxed())
    }

    async fn user(b: &mut Baton) -> HandlerResult {
        let mut name = String::new();
        b.scan(&mut [(&mut name).into()])?;
        Ok(Text::new(name).boxed())
    }

    struct HalfWritten;

    impl Responder for HalfWritten {
        fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
            baton.writer().write_all(b"partial;")?;
            Err(RespondError::Custom("renderer gave up".into()))
        }
    }

    async fn half_written(_b: &mut Baton) -> HandlerResult {
        Ok(Box::new(HalfWritten))
    }

    #[test]
    fn router_starts_empty() {
        let r = router();
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);
        assert_eq!(r.login_path(), DEFAULT_LOGIN_PATH);
    }

    #[test]
    fn invalid_pattern_is_rejected_and_not_registered() {
        let mut r = router();
        assert!(matches!(
            r.add_route("/bad/(%d", first),
            Err(PatternError::Invalid { .. })
        ));
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn first_registered_wins_word_then_literal() {
        let mut r = router();
        r.add_route("/a/%s", first).unwrap();
        r.add_route("/a/b", second).unwrap();
        let res = r.dispatch(make_request("/a/b")).await;
        assert_eq!(body(&res), "first");
    }

    #[tokio::test]
    async fn first_registered_wins_literal_then_word() {
        let mut r = router();
        r.add_route("/a/b", second).unwrap();
        r.add_route("/a/%s", first).unwrap();
        assert_eq!(body(&r.dispatch(make_request("/a/b")).await), "second");
        assert_eq!(body(&r.dispatch(make_request("/a/c")).await), "first");
    }

    #[tokio::test]
    async fn handler_scans_path_parameters() {
        let mut r = router();
        r.add_route("/api/site/%d/%s", site).unwrap();
        let res = r.dispatch(make_request("/api/site/1/hello")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), "1:hello");
    }

    #[tokio::test]
    async fn scan_error_becomes_500_with_message() {
        let mut r = router();
        r.add_route("/api/site/%d/%s", wrong_arity).unwrap();
        let res = r.dispatch(make_request("/api/site/1/hello")).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(&res),
            "path has 2 parameters but 1 destinations were supplied"
        );
    }

    #[tokio::test]
    async fn responder_error_appends_after_partial_output() {
        let mut r = router();
        r.add_route("/half", half_written).unwrap();
        let res = r.dispatch(make_request("/half")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), "partial;renderer gave up");
    }

    #[tokio::test]
    async fn handler_error_after_output_keeps_status_and_appends() {
        let mut r = router();
        r.add_route("/save", saved_then_failed).unwrap();
        let res = r.dispatch(make_request("/save")).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(body(&res), "{\"saved\":1}\nquota exceeded");
    }

    #[tokio::test]
    async fn redirect_target_from_query_cannot_inject_headers() {
        let mut r = router();
        r.add_route("/go", go_next).unwrap();
        let res = r
            .dispatch(make_request("/go?next=/home%0d%0aSet-Cookie:%20admin=1"))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert!(res.headers().get("set-cookie").is_none());

        let wire = res.into_bytes();
        let wire = std::str::from_utf8(&wire).unwrap();
        assert!(wire.contains("Location: /home  Set-Cookie: admin=1\r\n"));
        assert!(!wire.contains("\r\nSet-Cookie: admin=1\r\n"));
    }

    #[tokio::test]
    async fn encoded_path_matches_decoded_form() {
        let mut r = router();
        r.add_route("/u/%s", user).unwrap();
        let res = r.dispatch(make_request("/u/a%5Fb")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(&res), "a_b");
    }

    #[tokio::test]
    async fn unmatched_path_goes_to_fallback() {
        let mut r = router();
        r.add_route("/a/%d", first).unwrap();
        let res = r.dispatch(make_request("/a/x")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&res), "fallback");
    }

    #[tokio::test]
    async fn token_reaches_handler() {
        let mut r = router();
        r.add_route("/me", whoami).unwrap();
        assert_eq!(body(&r.dispatch(make_request("/me")).await), "user-1");
    }

    #[tokio::test]
    async fn missing_token_redirects_without_running_handlers() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        async fn counted(_b: &mut Baton) -> HandlerResult {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Text::new("ran").boxed())
        }

        let anonymous = |_req: &Request| -> Result<Option<Token>, AuthError> { Ok(None) };
        let mut r = Router::new(anonymous, not_found).with_login_path("/signin");
        r.add_route("/%s", counted).unwrap();

        let res = r.dispatch(make_request("/dashboard")).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers().get("location"), Some("/signin"));
        assert!(res.content().is_empty());
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_failure_is_generic_500() {
        let broken = |_req: &Request| -> Result<Option<Token>, AuthError> {
            Err(AuthError::Backend("session store down".into()))
        };
        let mut r = Router::new(broken, not_found);
        r.add_route("/a", first).unwrap();

        let res = r.dispatch(make_request("/a")).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&res), UNKNOWN_ERROR_BODY);
    }
}
