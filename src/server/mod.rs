//! Async TCP host for an [`Application`].
//!
//! Accepts connections, parses HTTP/1.1 requests, injects the per-request context and
//! hands each request to the router. Persistent connections (keep-alive) are
//! supported. A [`DispatchError`](crate::router::DispatchError), or any error from a
//! raw [`run`](Server::run) handler, is fatal to its connection: the peer gets a
//! `500` with `Connection: close` and the socket is closed.

use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::router::Application;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Default cap on a buffered request (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The HTTP/1.1 host.
///
/// # Examples
///
/// ```rust,no_run
/// use rtrie::router::{Application, Route};
/// use rtrie::server::Server;
/// use rtrie::{Response, StatusCode};
///
/// #[derive(Clone)]
/// struct Ctx;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let app = Application::new(vec![Route::handle("ping", |_req, _ctx: Ctx| async {
///         Response::new(StatusCode::Ok).body("pong")
///     })])?;
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.serve(app, |_req| Ctx).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_request_size: usize,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            max_request_size: MAX_REQUEST_SIZE,
        })
    }

    /// Binds to `config.bind` and applies `config.max_request_size`.
    ///
    /// # Errors
    ///
    /// As [`bind`](Self::bind).
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let server = Self::bind(&config.bind).await?;
        Ok(server.max_request_size(config.max_request_size))
    }

    /// Overrides the request size limit.
    #[must_use]
    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve `app`, inserting `make_context(&request)` into each request's extensions
    /// before dispatch.
    ///
    /// Runs until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve<C, M>(self, app: Application<C>, make_context: M) -> Result<(), ServerError>
    where
        C: Clone + Send + Sync + 'static,
        M: Fn(&Request) -> C + Send + Sync + 'static,
    {
        info!(routes = app.table().len(), "route table ready");
        for path in app.table().paths() {
            debug!(%path, "route");
        }

        let make_context = Arc::new(make_context);
        self.run(move |mut request: Request| {
            let app = app.clone();
            let context = make_context(&request);
            request.extensions_mut().insert(context);
            async move { app.dispatch(request).await }
        })
        .await
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler is shared across all spawned Tokio tasks, so it must be
    /// `Send + Sync + 'static`. An `Err` from it closes the connection after a `500`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F, E>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let handler = Arc::new(handler);
        let limit = self.max_request_size;
        info!(address = %self.local_addr, "rtrie listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler, limit).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// Loops one request per iteration until the peer closes, asks for
/// `Connection: close`, or the handler fails.
async fn handle_connection<H, F, E>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    limit: usize,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        if buf.len() > limit {
            warn!(peer = %peer_addr, limit, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        let (mut request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        // Wait for the full body to arrive if Content-Length is set.
        let declared = request.content_length().unwrap_or(0);
        let total_needed = match body_offset.checked_add(declared) {
            Some(total) if total <= limit => total,
            _ => {
                warn!(peer = %peer_addr, declared, limit, "declared body exceeds limit, sending 413");
                let response = Response::new(StatusCode::PayloadTooLarge)
                    .body("Request entity too large")
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };
        if buf.len() < total_needed {
            continue;
        }
        request.set_body(Bytes::copy_from_slice(&buf[body_offset..total_needed]));

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        match handler(request).await {
            Ok(response) => {
                stream.write_all(&response.into_bytes()).await?;
                stream.flush().await?;
            }
            Err(e) => {
                error!(peer = %peer_addr, error = %e, "request failed — closing connection");
                let response = Response::new(StatusCode::InternalServerError)
                    .body("Internal Server Error")
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                stream.flush().await?;
                break;
            }
        }

        buf.advance(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}
