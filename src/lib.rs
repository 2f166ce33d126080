//! # baton
//!
//! An HTTP request dispatcher: URL patterns with typed placeholders, an
//! authentication gate in front of every route, and handlers that return
//! *responders* describing the response instead of writing it themselves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use baton::auth::{AuthError, Token};
//! use baton::context::Baton;
//! use baton::responder::{Json, Responder};
//! use baton::router::{HandlerResult, Router};
//! use baton::server::Server;
//! use baton::{Request, Response, StatusCode};
//!
//! async fn site(baton: &mut Baton) -> HandlerResult {
//!     let mut id = 0_u64;
//!     let mut tab = String::new();
//!     baton.scan(&mut [(&mut id).into(), (&mut tab).into()])?;
//!     Ok(Json::new(serde_json::json!({ "site": id, "tab": tab })).boxed())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = |req: &Request| -> Result<Option<Token>, AuthError> {
//!         Ok(req.headers().get("cookie").map(|c| Token::new(c.to_owned())))
//!     };
//!     let mut router = Router::new(auth, |_req: Request| async {
//!         Response::new(StatusCode::NOT_FOUND).body("Not Found")
//!     });
//!     router.add_route("/api/site/%d/%s", site)?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod context;
pub mod http;
pub mod responder;
pub mod router;
pub mod server;

/// Type-erased error used where the concrete error type belongs to the caller:
/// handler failures, template engines, authentication backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Baton;
pub use http::{Headers, Method, Request, Response, ResponseWriter, StatusCode};
pub use responder::Responder;
pub use router::{HandlerResult, Router};
pub use server::{Server, ServerError};
