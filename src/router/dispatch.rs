//! Per-request dispatch against a compiled route table.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use tracing::{Instrument, debug, debug_span, error};

use super::compile::{CompileError, CompiledTrie, DuplicatePolicy, compile_with};
use super::{BoxError, Remainder, Route};
use crate::{Request, Response};

/// Failures surfaced to the host. An unmatched path is *not* one of them; it yields
/// a `404` response instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The host did not inject the per-request context. This is a wiring defect and
    /// the request is abandoned before any route is consulted.
    #[error("context not found in request (expected `{type_name}`)")]
    ContextMissing { type_name: &'static str },

    /// The matched handler failed. Passed through as-is.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

/// A compiled route table ready to serve requests whose context type is `C`.
///
/// Cloning is cheap: the table sits behind an [`Arc`] and is never mutated, so every
/// connection task can hold its own copy and dispatch without locking.
///
/// # Examples
///
/// ```
/// use rtrie::router::{Application, Route};
/// use rtrie::{Method, Request, Response, StatusCode};
///
/// #[derive(Clone)]
/// struct Ctx;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = Application::new(vec![Route::capture("users", |rest, _req, _ctx: Ctx| async move {
///     Response::new(StatusCode::Ok).body_bytes(rest.as_bytes())
/// })])
/// .unwrap();
///
/// let mut request = Request::new(Method::Get, "/users/42");
/// request.extensions_mut().insert(Ctx);
/// let response = app.dispatch(request).await.unwrap();
/// assert_eq!(response.body_ref(), b"/42");
/// # }
/// ```
pub struct Application<C> {
    table: Arc<CompiledTrie<C>>,
    _context: PhantomData<fn(C)>,
}

impl<C> Clone for Application<C> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            _context: PhantomData,
        }
    }
}

impl<C> std::fmt::Debug for Application<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("table", &self.table)
            .finish()
    }
}

impl<C> Application<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Compile `routes` with the default [`DuplicatePolicy`].
    ///
    /// # Errors
    ///
    /// See [`compile_with`].
    pub fn new(routes: impl IntoIterator<Item = Route<C>>) -> Result<Self, CompileError> {
        Self::with_policy(routes, DuplicatePolicy::default())
    }

    /// Compile `routes`, resolving duplicate paths according to `policy`.
    ///
    /// # Errors
    ///
    /// See [`compile_with`].
    pub fn with_policy(
        routes: impl IntoIterator<Item = Route<C>>,
        policy: DuplicatePolicy,
    ) -> Result<Self, CompileError> {
        Ok(Self::from_table(compile_with(routes, policy)?))
    }

    pub fn from_table(table: CompiledTrie<C>) -> Self {
        Self {
            table: Arc::new(table),
            _context: PhantomData,
        }
    }

    pub fn table(&self) -> &CompiledTrie<C> {
        &self.table
    }

    /// Route `request` to the handler with the longest matching key.
    ///
    /// 1. The context `C` is read from the request's extensions; if absent this fails
    ///    with [`DispatchError::ContextMissing`] without looking at the routes.
    /// 2. No matching key: `404 Not Found` with the path as body.
    /// 3. Otherwise the handler runs with the bytes after the key, the request and the
    ///    context, and its response is returned unchanged.
    ///
    /// # Errors
    ///
    /// [`DispatchError::ContextMissing`] as above, or [`DispatchError::Handler`] when
    /// the handler itself fails.
    pub async fn dispatch(&self, request: Request) -> Result<Response, DispatchError> {
        let Some(context) = request.extensions().get::<C>().cloned() else {
            error!(
                path = %request.path(),
                context = type_name::<C>(),
                "no context injected into request"
            );
            return Err(DispatchError::ContextMissing {
                type_name: type_name::<C>(),
            });
        };

        let path = request.path_bytes();
        let Some(found) = self.table.lookup(&path) else {
            debug!(path = %String::from_utf8_lossy(&path), "no route matched");
            return Ok(Response::not_found(&path));
        };

        let handler = Arc::clone(found.handler());
        let remainder = Remainder::new(path.slice_ref(found.remainder()));
        let span = debug_span!(
            "route",
            key = %String::from_utf8_lossy(found.key()),
            remainder = %String::from_utf8_lossy(found.remainder()),
        );

        handler(remainder, request, context)
            .instrument(span)
            .await
            .map_err(DispatchError::Handler)
    }
}
