//! # rtrie
//!
//! A prefix-trie request router. Routes are declared as a tree of relative prefixes,
//! compiled once into a single longest-prefix-match table, and dispatched with the
//! unmatched tail of the path handed to the handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtrie::router::{Application, Route};
//! use rtrie::server::Server;
//! use rtrie::{Response, StatusCode};
//!
//! #[derive(Clone)]
//! struct Ctx;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new(vec![
//!         Route::literal("api").nest([
//!             Route::handle("status", |_req, _ctx: Ctx| async {
//!                 Response::new(StatusCode::Ok).body("up")
//!             }),
//!             Route::capture("users", |rest, _req, _ctx: Ctx| async move {
//!                 Response::new(StatusCode::Ok).body_bytes(rest.as_bytes())
//!             }),
//!         ]),
//!     ])?;
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(app, |_req| Ctx).await?;
//!     Ok(())
//! }
//! ```

// ── Routing core ──────────────────────────────────────────────────────────────
pub mod context;
pub mod router;

// ── Host: transport, configuration, logging ──────────────────────────────────
pub mod config;
pub mod http;
pub mod logging;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{Application, DispatchError, Remainder, Route};
pub use server::{Server, ServerError};
