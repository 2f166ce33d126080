//! Small site served through the dispatcher.
//!
//! ```text
//! RUST_LOG=debug cargo run --example site
//! curl -i localhost:8080/api/site/1/overview                 # 307 to /login
//! curl -i -H 'Cookie: sid=abc' localhost:8080/api/site/1/overview
//! curl -i -H 'Cookie: sid=abc' 'localhost:8080/sites?ids=1,2&verbose=yes'
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use baton::auth::{AuthError, AuthFuture, Authenticator, Token};
use baton::context::Baton;
use baton::responder::{Json, Redirect, Responder, Template, TemplateEngine, Text};
use baton::router::{HandlerResult, Router};
use baton::server::Server;
use baton::{BoxError, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct User {
    name: String,
}

/// Looks the `sid` cookie up in an in-memory session table.
struct SessionAuth {
    sessions: HashMap<String, User>,
}

impl Authenticator for SessionAuth {
    fn authenticate<'a>(&'a self, request: &'a Request) -> AuthFuture<'a> {
        Box::pin(async move {
            let Some(cookie) = request.headers().get("cookie") else {
                return Ok(None);
            };
            let sid = cookie
                .split(';')
                .filter_map(|pair| pair.trim().strip_prefix("sid="))
                .next();
            match sid {
                Some("") => Err(AuthError::Rejected("empty session id".into())),
                Some(sid) => Ok(self.sessions.get(sid).cloned().map(Token::new)),
                None => Ok(None),
            }
        })
    }
}

/// Replaces `{{key}}` with top-level string or number fields of the data.
struct Braces {
    templates: HashMap<&'static str, &'static str>,
}

impl TemplateEngine for Braces {
    fn render(
        &self,
        out: &mut dyn Write,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), BoxError> {
        let mut text = self
            .templates
            .get(template)
            .ok_or_else(|| format!("unknown template {template}"))?
            .to_string();
        if let Some(fields) = data.as_object() {
            for (key, value) in fields {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                text = text.replace(&format!("{{{{{key}}}}}"), &value);
            }
        }
        out.write_all(text.as_bytes())?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SiteSummary {
    id: u64,
    verbose: bool,
}

fn user(baton: &Baton) -> String {
    baton
        .token()
        .downcast_ref::<User>()
        .map(|u| u.name.clone())
        .unwrap_or_default()
}

async fn home(_baton: &mut Baton) -> HandlerResult {
    Ok(Redirect::to("/sites").boxed())
}

async fn sites(baton: &mut Baton) -> HandlerResult {
    let verbose = baton.query_bool("verbose").unwrap_or(false);
    let ids = baton.query_uint_array("ids").unwrap_or_default();
    let page = baton.query_uint_or("page", 1);
    let summaries: Vec<SiteSummary> = ids
        .into_iter()
        .map(|id| SiteSummary { id, verbose })
        .collect();
    Ok(Json::new(json!({ "page": page, "sites": summaries })).boxed())
}

async fn site(baton: &mut Baton) -> HandlerResult {
    let mut id = 0_u32;
    let mut tab = String::new();
    baton.scan(&mut [(&mut id).into(), (&mut tab).into()])?;

    if baton.accepts("application/json") {
        return Ok(Json::new(json!({ "site": id, "tab": tab })).boxed());
    }
    let name = user(baton);
    Ok(Template::new("site", json!({ "id": id, "tab": tab, "user": name })).boxed())
}

async fn create_site(baton: &mut Baton) -> HandlerResult {
    let Some(name) = baton.form_value("name") else {
        baton.send_error("missing name", StatusCode::BAD_REQUEST);
        return Ok(Text::new("").boxed());
    };
    Ok(Json::new(json!({ "created": name }))
        .with_status(StatusCode::CREATED)
        .boxed())
}

async fn not_found(request: Request) -> Response {
    Response::new(StatusCode::NOT_FOUND).body(format!("nothing at {}", request.path()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let auth = SessionAuth {
        sessions: HashMap::from([(
            "abc".to_owned(),
            User {
                name: "dana".to_owned(),
            },
        )]),
    };
    let engine = Braces {
        templates: HashMap::from([("site", "<h1>Site {{id}}: {{tab}}</h1><p>{{user}}</p>")]),
    };

    let mut router = Router::new(auth, not_found).with_template_engine(Arc::new(engine));
    router.add_route("/", home)?;
    router.add_route("/sites", sites)?;
    router.add_route("/sites/new", create_site)?;
    router.add_route("/api/site/%d/%s", site)?;

    let server = Server::bind("127.0.0.1:8080").await?;
    tracing::info!(routes = router.len(), address = %server.local_addr(), "starting demo site");
    server.serve(router).await?;
    Ok(())
}
