//! Responders — values a handler returns to describe what to send.
//!
//! A handler decides *what* the response is; the router then asks the
//! returned [`Responder`] to write itself onto the [`Baton`]. Four variants
//! ship with the crate:
//!
//! | Responder    | Writes                                                   |
//! |--------------|----------------------------------------------------------|
//! | [`Json`]     | optional status, then the value as JSON plus a newline   |
//! | [`Redirect`] | `Location` header and a status (303 by default)          |
//! | [`Text`]     | the string verbatim                                      |
//! | [`Template`] | whatever a [`TemplateEngine`] renders for the name/data  |
//!
//! Any other type can take part by implementing [`Responder`].

use std::io::{self, Write};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::BoxError;
use crate::context::Baton;
use crate::http::StatusCode;

/// Errors raised while a responder renders.
#[derive(Debug, Error)]
pub enum RespondError {
    #[error("no template engine configured")]
    NoTemplateEngine,

    #[error("failed to encode JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("template {name:?} failed to render: {source}")]
    Template {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Custom(BoxError),
}

/// A single-use value that renders itself onto a [`Baton`].
///
/// `respond` consumes the boxed responder, so each one renders at most once.
///
/// # Examples
///
/// ```rust,no_run
/// use std::io::Write;
/// use baton::context::Baton;
/// use baton::responder::{RespondError, Responder};
///
/// struct Csv(Vec<(String, u64)>);
///
/// impl Responder for Csv {
///     fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
///         baton.writer().headers_mut().set("Content-Type", "text/csv");
///         for (name, count) in self.0 {
///             writeln!(baton.writer(), "{name},{count}")?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Responder: Send {
    fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError>;

    /// Box this responder for returning from a handler.
    fn boxed(self) -> Box<dyn Responder>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Renders named templates.
///
/// The engine is a collaborator: the crate only defines the call it makes.
pub trait TemplateEngine: Send + Sync {
    fn render(
        &self,
        out: &mut dyn Write,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), BoxError>;
}

/// Serializes a value as JSON.
pub struct Json<T> {
    value: T,
    status: Option<StatusCode>,
}

impl<T> Json<T>
where
    T: Serialize + Send,
{
    pub fn new(value: T) -> Self {
        Self {
            value,
            status: None,
        }
    }

    /// Write `status` before the body instead of the implicit `200 OK`.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl<T> Responder for Json<T>
where
    T: Serialize + Send,
{
    fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
        if let Some(status) = self.status {
            baton.writer().write_header(status);
        }
        baton.send_json(&self.value)?;
        Ok(())
    }
}

/// Sends the client elsewhere.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// `303 See Other` to `location`.
    pub fn to(location: impl Into<String>) -> Self {
        Self::with_status(location, StatusCode::SEE_OTHER)
    }

    /// `307 Temporary Redirect` to `location`; the method and body are kept.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self::with_status(location, StatusCode::TEMPORARY_REDIRECT)
    }

    pub fn with_status(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl Responder for Redirect {
    fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
        let writer = baton.writer();
        writer.headers_mut().set("Location", self.location);
        writer.write_header(self.status);
        Ok(())
    }
}

/// Writes a string as is.
#[derive(Debug, Clone)]
pub struct Text(String);

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Responder for Text {
    fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
        baton.writer().write_all(self.0.as_bytes())?;
        Ok(())
    }
}

/// Renders a named template with `data`.
///
/// Uses the engine attached with [`with_engine`](Self::with_engine), or else
/// the default engine configured on the router.
pub struct Template {
    name: String,
    data: serde_json::Value,
    engine: Option<Arc<dyn TemplateEngine>>,
}

impl Template {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
            engine: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }
}

impl Responder for Template {
    fn respond(self: Box<Self>, baton: &mut Baton) -> Result<(), RespondError> {
        let Template { name, data, engine } = *self;
        let engine = engine
            .or_else(|| baton.template_engine().cloned())
            .ok_or(RespondError::NoTemplateEngine)?;

        engine
            .render(baton.writer(), &name, &data)
            .map_err(|source| RespondError::Template { name, source })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::tests::baton;
    use crate::http::Response;

    struct Echo;

    impl TemplateEngine for Echo {
        fn render(
            &self,
            out: &mut dyn Write,
            template: &str,
            data: &serde_json::Value,
        ) -> Result<(), BoxError> {
            if template == "missing" {
                return Err("no such template".into());
            }
            write!(out, "{template}:{data}")?;
            Ok(())
        }
    }

    fn render(responder: impl Responder + 'static, mut b: Baton) -> (Result<(), RespondError>, Response) {
        let result = responder.boxed().respond(&mut b);
        let (_, writer) = b.into_parts();
        (result, writer.into_response())
    }

    #[test]
    fn json_without_status_is_ok() {
        let (result, r) = render(Json::new(json!({"id": 1})), baton("/"));
        result.unwrap();
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.content(), b"{\"id\":1}\n");
    }

    #[test]
    fn json_writes_status_first() {
        let (result, r) = render(
            Json::new(vec!["a", "b"]).with_status(StatusCode::CREATED),
            baton("/"),
        );
        result.unwrap();
        assert_eq!(r.status(), StatusCode::CREATED);
        assert_eq!(r.content(), b"[\"a\",\"b\"]\n");
    }

    #[test]
    fn redirect_defaults_to_see_other() {
        let redirect = Redirect::to("/sites");
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);

        let (result, r) = render(redirect, baton("/"));
        result.unwrap();
        assert_eq!(r.status(), StatusCode::SEE_OTHER);
        assert_eq!(r.headers().get("location"), Some("/sites"));
        assert!(r.content().is_empty());
    }

    #[test]
    fn temporary_redirect() {
        let (_, r) = render(Redirect::temporary("/login"), baton("/"));
        assert_eq!(r.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn text_is_verbatim() {
        let (result, r) = render(Text::new("<b>raw</b>"), baton("/"));
        result.unwrap();
        assert_eq!(r.content(), b"<b>raw</b>");
        assert!(r.headers().get("content-type").is_none());
    }

    #[test]
    fn template_without_any_engine_fails() {
        let (result, r) = render(Template::new("home", json!({})), baton("/"));
        assert!(matches!(result, Err(RespondError::NoTemplateEngine)));
        assert!(r.content().is_empty());
    }

    #[test]
    fn template_uses_its_own_engine() {
        let t = Template::new("home", json!({"n": 2})).with_engine(Arc::new(Echo));
        let (result, r) = render(t, baton("/"));
        result.unwrap();
        assert_eq!(r.content(), b"home:{\"n\":2}");
    }

    #[test]
    fn template_falls_back_to_baton_default() {
        let b = baton("/").with_templates(Some(Arc::new(Echo)));
        let (result, r) = render(Template::new("list", json!([1])), b);
        result.unwrap();
        assert_eq!(r.content(), b"list:[1]");
    }

    #[test]
    fn template_engine_errors_name_the_template() {
        let t = Template::new("missing", json!(null)).with_engine(Arc::new(Echo));
        let (result, _) = render(t, baton("/"));
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "template \"missing\" failed to render: no such template"
        );
    }
}
