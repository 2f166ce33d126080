//! Authentication gate — the collaborator the router consults before routing.
//!
//! An [`Authenticator`] inspects the raw [`Request`] and resolves to one of
//! three outcomes:
//!
//! | Result            | Router behaviour                                  |
//! |-------------------|---------------------------------------------------|
//! | `Ok(Some(token))` | token is placed on the [`Baton`] and routing runs |
//! | `Ok(None)`        | `307 Temporary Redirect` to the login path        |
//! | `Err(_)`          | `500` with the body `Unknown Error`               |
//!
//! [`Baton`]: crate::context::Baton

use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::{BoxError, Request};

/// Errors an [`Authenticator`] may report.
///
/// The text never reaches the client: the router logs it and answers with a
/// generic `Unknown Error`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("authentication backend failed: {0}")]
    Backend(#[source] BoxError),
}

/// Opaque identity produced by an [`Authenticator`].
///
/// The router never looks inside; handlers downcast it to whatever concrete
/// type their authenticator stores.
///
/// # Examples
///
/// ```
/// use baton::auth::Token;
///
/// struct User { id: u64 }
///
/// let token = Token::new(User { id: 7 });
/// assert_eq!(token.downcast_ref::<User>().map(|u| u.id), Some(7));
/// assert!(token.downcast_ref::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Token(Arc<dyn Any + Send + Sync>);

impl Token {
    pub fn new<T>(identity: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self(Arc::new(identity))
    }

    /// Borrow the identity as `T`, or `None` if it holds another type.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(..)")
    }
}

/// The future returned by [`Authenticator::authenticate`].
pub type AuthFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<Token>, AuthError>> + Send + 'a>>;

/// Resolves the identity behind a request.
///
/// Called exactly once per request, before any route is matched. Plain
/// synchronous closures `Fn(&Request) -> Result<Option<Token>, AuthError>`
/// implement this trait through the blanket impl below; authenticators that
/// need to await a session store implement it directly.
///
/// # Examples
///
/// ```rust,no_run
/// use baton::auth::{AuthError, AuthFuture, Authenticator, Token};
/// use baton::Request;
///
/// struct HeaderAuth;
///
/// impl Authenticator for HeaderAuth {
///     fn authenticate<'a>(&'a self, request: &'a Request) -> AuthFuture<'a> {
///         Box::pin(async move {
///             match request.headers().get("x-user") {
///                 Some(user) if user.is_empty() => Err(AuthError::Rejected("blank user".into())),
///                 Some(user) => Ok(Some(Token::new(user.to_owned()))),
///                 None => Ok(None),
///             }
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(&'a self, request: &'a Request) -> AuthFuture<'a>;
}

impl<F> Authenticator for F
where
    F: Fn(&Request) -> Result<Option<Token>, AuthError> + Send + Sync,
{
    fn authenticate<'a>(&'a self, request: &'a Request) -> AuthFuture<'a> {
        Box::pin(std::future::ready((self)(request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(extra: &str) -> Request {
        let raw = format!("GET / HTTP/1.1\r\nHost: localhost\r\n{extra}\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn token_downcasts_to_stored_type_only() {
        let token = Token::new(42_u64);
        assert_eq!(token.downcast_ref::<u64>(), Some(&42));
        assert!(token.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn token_clones_share_identity() {
        let token = Token::new(String::from("alice"));
        let copy = token.clone();
        assert_eq!(copy.downcast_ref::<String>().map(String::as_str), Some("alice"));
        assert_eq!(format!("{copy:?}"), "Token(..)");
    }

    #[tokio::test]
    async fn closures_are_authenticators() {
        let auth = |req: &Request| -> Result<Option<Token>, AuthError> {
            Ok(req
                .headers()
                .get("cookie")
                .map(|c| Token::new(c.to_owned())))
        };

        let with_cookie = auth.authenticate(&request("Cookie: sid=1\r\n")).await.unwrap();
        assert!(with_cookie.is_some());

        let without = auth.authenticate(&request("")).await.unwrap();
        assert!(without.is_none());
    }

    #[test]
    fn backend_error_keeps_source() {
        let err = AuthError::Backend("store unreachable".into());
        assert_eq!(
            err.to_string(),
            "authentication backend failed: store unreachable"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
