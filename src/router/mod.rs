//! Prefix-trie request routing.
//!
//! Routes are declared as a tree. Each node names a path prefix *relative to its
//! parent*; the compiler joins ancestor prefixes with `/` and inserts every full path
//! into a single [`PrefixTrie`](trie::PrefixTrie). At dispatch time the **longest**
//! registered key that prefixes the request path wins, and the bytes after it are
//! handed to the handler as the [`Remainder`].
//!
//! ```text
//! Route::literal("api").nest([             "/api"        -> 404 (echoes path)
//!     Route::handle("status", status),     "/api/status" -> status(req, ctx)
//!     Route::capture("users", user),       "/api/users"  -> user(rest, req, ctx)
//! ])
//! ```
//!
//! A request for `/api/users/42` matches `/api/users` and `user` receives the
//! remainder `/42`. A request for `/health` matches nothing and gets the fixed
//! `404 Not Found` response with body `/health`.
//!
//! Every handler also receives the per-request context `C` that the host injected
//! into the request's [`Extensions`](crate::context::Extensions).

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Request, Response};

pub mod compile;
pub mod dispatch;
pub mod trie;

pub use compile::{CompileError, CompiledTrie, DuplicatePolicy, Match, compile, compile_with};
pub use dispatch::{Application, DispatchError};

/// Error type handlers may fail with. Propagated to the host untouched.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed future returned by a type-erased [`Handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, BoxError>> + Send>>;

/// Type-erased route handler: `(remainder, request, context) -> response`.
///
/// Never built by hand; [`Route::handle`] and [`Route::capture`] adapt ordinary async
/// closures into this shape.
pub type Handler<C> = Arc<dyn Fn(Remainder, Request, C) -> HandlerFuture + Send + Sync + 'static>;

/// What a handler may resolve to: a plain [`Response`], or a `Result` whose error
/// converts into [`BoxError`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Response, BoxError>;
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Response, BoxError> {
        Ok(self)
    }
}

impl<E> IntoReply for Result<Response, E>
where
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)
    }
}

/// The part of the request path after the matched route key.
///
/// Byte-exact: for key `/api/v1` and path `/api/v1/widgets` the remainder is
/// `/widgets`, leading separator included. Empty when the path equals the key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Remainder(Bytes);

impl Remainder {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// UTF-8 view, or `None` if the remainder is not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Non-empty `/`-separated pieces, e.g. `/42/edit` yields `42`, `edit`.
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.0.split(|b| *b == b'/').filter(|s| !s.is_empty())
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl fmt::Debug for Remainder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Remainder({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl PartialEq<[u8]> for Remainder {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&str> for Remainder {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

/// How a leaf came to be; only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// Placeholder segment bound to the default not-found handler.
    Literal,
    /// Handler that ignores the remainder.
    Handle,
    /// Handler that receives the remainder.
    Capture,
}

/// A terminal route: one caller-local prefix bound to one handler.
pub struct Leaf<C> {
    prefix: String,
    kind: LeafKind,
    handler: Handler<C>,
}

impl<C> Leaf<C> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    pub(crate) fn into_parts(self) -> (String, LeafKind, Handler<C>) {
        (self.prefix, self.kind, self.handler)
    }
}

impl<C> Clone for Leaf<C> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            kind: self.kind,
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> fmt::Debug for Leaf<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("prefix", &self.prefix)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A node of the route declaration tree.
///
/// `C` is the per-request context type the handlers receive.
pub enum Route<C> {
    Leaf(Leaf<C>),
    /// A parent leaf plus children whose prefixes are relative to the parent's.
    Branch {
        parent: Leaf<C>,
        children: Vec<Route<C>>,
    },
}

impl<C> Route<C>
where
    C: Send + 'static,
{
    /// A path segment with no handler of its own, typically the parent of a branch.
    /// Requests that stop here get the not-found response echoing their path.
    pub fn literal(prefix: impl Into<String>) -> Self {
        let handler: Handler<C> = Arc::new(
            |_remainder: Remainder, request: Request, _context: C| -> HandlerFuture {
                let response = Response::not_found(request.raw_path());
                Box::pin(std::future::ready(Ok::<_, BoxError>(response)))
            },
        );
        Self::leaf(prefix, LeafKind::Literal, handler)
    }

    /// A handler that only needs the request and context. Any remainder is ignored.
    ///
    /// ```
    /// use rtrie::router::Route;
    /// use rtrie::{Response, StatusCode};
    ///
    /// let route: Route<()> = Route::handle("status", |_request, _ctx| async {
    ///     Response::new(StatusCode::Ok).body("up")
    /// });
    /// assert_eq!(route.prefix(), "status");
    /// ```
    pub fn handle<F, Fut>(prefix: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Request, C) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply,
    {
        let handler: Handler<C> = Arc::new(
            move |_remainder: Remainder, request: Request, context: C| -> HandlerFuture {
                let fut = handler(request, context);
                Box::pin(async move { fut.await.into_reply() })
            },
        );
        Self::leaf(prefix, LeafKind::Handle, handler)
    }

    /// A handler that consumes the path beyond its prefix, e.g. a resource id.
    ///
    /// ```
    /// use rtrie::router::Route;
    /// use rtrie::{Response, StatusCode};
    ///
    /// let route: Route<()> = Route::capture("users", |rest, _request, _ctx| async move {
    ///     let id = rest.segments().next().map(<[u8]>::to_vec).unwrap_or_default();
    ///     Response::new(StatusCode::Ok).body_bytes(id)
    /// });
    /// assert_eq!(route.prefix(), "users");
    /// ```
    pub fn capture<F, Fut>(prefix: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Remainder, Request, C) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoReply,
    {
        let handler: Handler<C> = Arc::new(
            move |remainder: Remainder, request: Request, context: C| -> HandlerFuture {
                let fut = handler(remainder, request, context);
                Box::pin(async move { fut.await.into_reply() })
            },
        );
        Self::leaf(prefix, LeafKind::Capture, handler)
    }
}

impl<C> Route<C> {
    fn leaf(prefix: impl Into<String>, kind: LeafKind, handler: Handler<C>) -> Self {
        Route::Leaf(Leaf {
            prefix: prefix.into(),
            kind,
            handler,
        })
    }

    /// Group `children` under `parent`.
    ///
    /// If `parent` is already a branch the new children are appended after its
    /// existing ones, which flattens to the same keys as nesting one level deeper.
    pub fn compose(parent: Route<C>, children: impl IntoIterator<Item = Route<C>>) -> Self {
        match parent {
            Route::Leaf(parent) => Route::Branch {
                parent,
                children: children.into_iter().collect(),
            },
            Route::Branch {
                parent,
                children: mut existing,
            } => {
                existing.extend(children);
                Route::Branch {
                    parent,
                    children: existing,
                }
            }
        }
    }

    /// Builder form of [`Route::compose`].
    #[must_use]
    pub fn nest(self, children: impl IntoIterator<Item = Route<C>>) -> Self {
        Self::compose(self, children)
    }

    /// The caller-local prefix of this route (the parent's, for a branch).
    pub fn prefix(&self) -> &str {
        match self {
            Route::Leaf(leaf) => leaf.prefix(),
            Route::Branch { parent, .. } => parent.prefix(),
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Route::Branch { .. })
    }

    pub fn children(&self) -> &[Route<C>] {
        match self {
            Route::Leaf(_) => &[],
            Route::Branch { children, .. } => children,
        }
    }
}

impl<C> Clone for Route<C> {
    fn clone(&self) -> Self {
        match self {
            Route::Leaf(leaf) => Route::Leaf(leaf.clone()),
            Route::Branch { parent, children } => Route::Branch {
                parent: parent.clone(),
                children: children.clone(),
            },
        }
    }
}

impl<C> fmt::Debug for Route<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Leaf(leaf) => fmt::Debug::fmt(leaf, f),
            Route::Branch { parent, children } => f
                .debug_struct("Branch")
                .field("parent", parent)
                .field("children", children)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, StatusCode};

    fn ok(_req: Request, _ctx: ()) -> std::future::Ready<Response> {
        std::future::ready(Response::new(StatusCode::Ok))
    }

    #[test]
    fn constructors_record_kind_and_prefix() {
        let routes: Vec<Route<()>> = vec![
            Route::literal("api"),
            Route::handle("status", ok),
            Route::capture("users", |_rest, _req, _ctx| async {
                Response::new(StatusCode::Ok)
            }),
        ];
        let kinds: Vec<_> = routes
            .iter()
            .map(|r| match r {
                Route::Leaf(leaf) => (leaf.prefix().to_owned(), leaf.kind()),
                Route::Branch { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(
            kinds,
            [
                ("api".to_owned(), LeafKind::Literal),
                ("status".to_owned(), LeafKind::Handle),
                ("users".to_owned(), LeafKind::Capture),
            ]
        );
    }

    #[test]
    fn compose_builds_a_branch() {
        let route: Route<()> =
            Route::compose(Route::literal("api"), [Route::handle("v1", ok)]);
        assert!(route.is_branch());
        assert_eq!(route.prefix(), "api");
        assert_eq!(route.children().len(), 1);
        assert_eq!(route.children()[0].prefix(), "v1");
    }

    #[test]
    fn composing_onto_a_branch_appends_children() {
        let route: Route<()> = Route::literal("api")
            .nest([Route::handle("a", ok)])
            .nest([Route::handle("b", ok)]);
        let prefixes: Vec<_> = route.children().iter().map(Route::prefix).collect();
        assert_eq!(prefixes, ["a", "b"]);
    }

    #[test]
    fn leaf_has_no_children() {
        let route: Route<()> = Route::handle("x", ok);
        assert!(!route.is_branch());
        assert!(route.children().is_empty());
    }

    #[tokio::test]
    async fn literal_handler_echoes_path_as_not_found() {
        let Route::Leaf(leaf) = Route::<()>::literal("api") else {
            unreachable!()
        };
        let (_, _, handler) = leaf.into_parts();
        let response = handler(Remainder::default(), Request::new(Method::Get, "/api"), ())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body_ref(), b"/api");
    }

    #[tokio::test]
    async fn handler_errors_are_boxed() {
        #[derive(Debug, thiserror::Error)]
        #[error("backend down")]
        struct Down;

        let Route::Leaf(leaf) = Route::<()>::handle("x", |_req, _ctx| async {
            Err::<Response, _>(Down)
        }) else {
            unreachable!()
        };
        let (_, _, handler) = leaf.into_parts();
        let err = handler(Remainder::default(), Request::new(Method::Get, "/x"), ())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }

    #[test]
    fn remainder_views() {
        let rest = Remainder::new(&b"/42//edit"[..]);
        assert_eq!(rest.as_str(), Some("/42//edit"));
        assert_eq!(rest.len(), 9);
        let segments: Vec<_> = rest.segments().collect();
        assert_eq!(segments, [&b"42"[..], &b"edit"[..]]);
        assert!(Remainder::default().is_empty());
        assert!(Remainder::new(vec![0xff]).as_str().is_none());
        assert_eq!(rest, "/42//edit");
    }
}
