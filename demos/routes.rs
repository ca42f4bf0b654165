//! A small service wired the way a real program would use the crate.
//!
//! ```text
//! cargo run --example routes -- [config.toml]
//! curl -i localhost:8080/api/v1/widgets/42
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rtrie::config::ServerConfig;
use rtrie::router::{Application, Route};
use rtrie::{Request, Response, Server, StatusCode, logging};
use serde::Serialize;

/// Per-request context: a sequential request id.
#[derive(Clone, Debug)]
struct RequestId(u64);

#[derive(Serialize)]
struct Widget<'a> {
    id: &'a str,
    request: u64,
}

fn routes() -> Vec<Route<RequestId>> {
    vec![
        Route::handle("health", |_req, _ctx| async {
            Response::new(StatusCode::Ok).body("ok")
        }),
        Route::literal("api").nest([Route::literal("v1").nest([
            Route::capture("widgets", |rest, _req, ctx: RequestId| async move {
                let Some(id) = rest.segments().next().and_then(|s| std::str::from_utf8(s).ok())
                else {
                    return Response::json(StatusCode::Ok, &["alpha", "beta"]);
                };
                Response::json(StatusCode::Ok, &Widget { id, request: ctx.0 })
            }),
            Route::handle("echo", |req: Request, _ctx| async move {
                Response::new(StatusCode::Ok).body_bytes(req.body().to_vec())
            }),
        ])]),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    logging::init(&config.log)?;

    let app = Application::with_policy(routes(), config.duplicate_routes)?;
    let server = Server::from_config(&config).await?;

    let counter = Arc::new(AtomicU64::new(0));
    server
        .serve(app, move |_req| RequestId(counter.fetch_add(1, Ordering::Relaxed)))
        .await?;
    Ok(())
}
