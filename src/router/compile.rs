//! Flattening a route tree into a [`CompiledTrie`].
//!
//! A leaf with prefix `p` found under accumulated path `P` is stored at `P/p`. A branch
//! stores its parent leaf the same way and then visits its children with the parent's
//! full path as their `P`. Top-level routes start from the empty path, so `"api"`
//! compiles to `/api`.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::trie::PrefixTrie;
use super::{Handler, Leaf, LeafKind, Route};

/// Path separator inserted between a parent's path and a child's prefix.
pub const SEPARATOR: char = '/';

/// What to do when two leaves flatten to the same full path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the handler declared last. Logged at `warn`.
    #[default]
    Overwrite,
    /// Fail compilation with [`CompileError::DuplicatePrefix`].
    Reject,
}

/// Errors raised while compiling a route tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid route prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("route {path} is declared more than once")]
    DuplicatePrefix { path: String },
}

/// The immutable routing table produced by [`compile`].
///
/// Shared read-only between all concurrent dispatches; nothing mutates it after
/// construction.
pub struct CompiledTrie<C> {
    trie: PrefixTrie<Entry<C>>,
}

struct Entry<C> {
    kind: LeafKind,
    handler: Handler<C>,
}

/// Outcome of a successful lookup: which key matched and what is left of the path.
pub struct Match<'a, C> {
    key: &'a [u8],
    remainder: &'a [u8],
    handler: &'a Handler<C>,
}

impl<'a, C> Match<'a, C> {
    /// The full registered path that matched.
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// The bytes of the request path after [`key`](Self::key).
    pub fn remainder(&self) -> &'a [u8] {
        self.remainder
    }

    pub(crate) fn handler(&self) -> &'a Handler<C> {
        self.handler
    }
}

impl<C> CompiledTrie<C> {
    /// Longest-prefix lookup of `path`.
    pub fn lookup<'a>(&'a self, path: &'a [u8]) -> Option<Match<'a, C>> {
        let (len, entry) = self.trie.longest_match(path)?;
        let (key, remainder) = path.split_at(len);
        Some(Match {
            key,
            remainder,
            handler: &entry.handler,
        })
    }

    /// Whether `path` is registered exactly.
    pub fn contains(&self, path: &str) -> bool {
        self.trie.contains_key(path.as_bytes())
    }

    /// Every registered path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.trie
            .iter()
            .map(|(key, _)| String::from_utf8_lossy(&key).into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }
}

impl<C> std::fmt::Debug for CompiledTrie<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTrie")
            .field("paths", &self.trie)
            .finish()
    }
}

/// Compile `routes` with [`DuplicatePolicy::Overwrite`].
///
/// ```
/// use rtrie::router::{Route, compile};
/// use rtrie::{Response, StatusCode};
///
/// let routes: Vec<Route<()>> = vec![
///     Route::literal("api").nest([
///         Route::handle("v1", |_req, _ctx| async { Response::new(StatusCode::Ok) }),
///     ]),
/// ];
/// let table = compile(routes).unwrap();
/// assert_eq!(table.paths(), ["/api", "/api/v1"]);
///
/// let found = table.lookup(b"/api/v1/widgets").unwrap();
/// assert_eq!(found.key(), b"/api/v1");
/// assert_eq!(found.remainder(), b"/widgets");
/// ```
///
/// # Errors
///
/// [`CompileError::InvalidPrefix`] if any prefix is malformed.
pub fn compile<C>(
    routes: impl IntoIterator<Item = Route<C>>,
) -> Result<CompiledTrie<C>, CompileError> {
    compile_with(routes, DuplicatePolicy::default())
}

/// Compile `routes`, resolving duplicate full paths according to `policy`.
///
/// # Errors
///
/// - [`CompileError::InvalidPrefix`] if any prefix is malformed.
/// - [`CompileError::DuplicatePrefix`] under [`DuplicatePolicy::Reject`].
pub fn compile_with<C>(
    routes: impl IntoIterator<Item = Route<C>>,
    policy: DuplicatePolicy,
) -> Result<CompiledTrie<C>, CompileError> {
    let mut compiler = Compiler {
        trie: PrefixTrie::new(),
        policy,
    };
    for route in routes {
        compiler.visit(route, "")?;
    }
    info!(routes = compiler.trie.len(), ?policy, "route table compiled");
    Ok(CompiledTrie {
        trie: compiler.trie,
    })
}

struct Compiler<C> {
    trie: PrefixTrie<Entry<C>>,
    policy: DuplicatePolicy,
}

impl<C> Compiler<C> {
    fn visit(&mut self, route: Route<C>, base: &str) -> Result<(), CompileError> {
        match route {
            Route::Leaf(leaf) => {
                self.insert(base, leaf)?;
            }
            Route::Branch { parent, children } => {
                if parent.prefix().ends_with(SEPARATOR) {
                    return Err(CompileError::InvalidPrefix {
                        prefix: parent.prefix().to_owned(),
                        reason: "a prefix with children must not end with '/'; children are joined with one",
                    });
                }
                let nested = self.insert(base, parent)?;
                for child in children {
                    self.visit(child, &nested)?;
                }
            }
        }
        Ok(())
    }

    // Returns the full path the leaf was stored under.
    fn insert(&mut self, base: &str, leaf: Leaf<C>) -> Result<String, CompileError> {
        let (prefix, kind, handler) = leaf.into_parts();
        validate_prefix(&prefix)?;

        let path = format!("{base}{SEPARATOR}{prefix}");
        if self.policy == DuplicatePolicy::Reject && self.trie.contains_key(path.as_bytes()) {
            return Err(CompileError::DuplicatePrefix { path });
        }

        debug!(%path, ?kind, "route registered");
        let previous = self.trie.insert(path.as_bytes(), Entry { kind, handler });
        match previous {
            // Re-opening a literal group replaces one placeholder with an identical one.
            Some(old) if old.kind == LeafKind::Literal && kind == LeafKind::Literal => {}
            Some(_) => warn!(%path, "route declared more than once; the later declaration wins"),
            None => {}
        }
        Ok(path)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), CompileError> {
    let reason = if prefix.is_empty() {
        "prefix is empty"
    } else if prefix.starts_with(SEPARATOR) {
        "prefix must not start with '/'; the separator is added when routes are joined"
    } else if prefix.contains("//") {
        "prefix contains an empty segment"
    } else if prefix.contains(['?', '#']) {
        "prefix contains a query or fragment delimiter"
    } else {
        return Ok(());
    };
    Err(CompileError::InvalidPrefix {
        prefix: prefix.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response, StatusCode};

    fn ok(_req: Request, _ctx: ()) -> std::future::Ready<Response> {
        std::future::ready(Response::new(StatusCode::Ok))
    }

    fn accepted(_req: Request, _ctx: ()) -> std::future::Ready<Response> {
        std::future::ready(Response::new(StatusCode::Accepted))
    }

    #[test]
    fn top_level_leaf_gets_a_leading_separator() {
        let table = compile(vec![Route::handle("status", ok)]).unwrap();
        assert_eq!(table.paths(), ["/status"]);
    }

    #[test]
    fn nested_keys_join_every_ancestor() {
        let routes: Vec<Route<()>> = vec![Route::literal("a").nest([
            Route::literal("b").nest([Route::literal("c").nest([Route::handle("d", ok)])]),
            Route::handle("e", ok),
        ])];
        let table = compile(routes).unwrap();
        assert_eq!(table.paths(), ["/a", "/a/b", "/a/b/c", "/a/b/c/d", "/a/e"]);
    }

    #[test]
    fn multi_segment_prefixes_are_kept_whole() {
        let routes: Vec<Route<()>> =
            vec![Route::literal("api/v1").nest([Route::handle("users/active", ok)])];
        let table = compile(routes).unwrap();
        assert!(table.contains("/api/v1/users/active"));
        assert!(!table.contains("/api"));
    }

    #[test]
    fn lookup_prefers_the_longest_key() {
        let routes: Vec<Route<()>> = vec![
            Route::handle("api", ok),
            Route::literal("api").nest([Route::handle("v1", ok)]),
        ];
        let table = compile(routes).unwrap();
        let found = table.lookup(b"/api/v1/widgets").unwrap();
        assert_eq!(found.key(), b"/api/v1");
        assert_eq!(found.remainder(), b"/widgets");
    }

    #[test]
    fn lookup_misses_unrelated_paths() {
        let table = compile(vec![Route::handle("status", ok)]).unwrap();
        assert!(table.lookup(b"/health").is_none());
        assert!(table.lookup(b"").is_none());
    }

    #[test]
    fn exact_path_has_empty_remainder() {
        let table = compile(vec![Route::handle("update", ok)]).unwrap();
        let found = table.lookup(b"/update").unwrap();
        assert!(found.remainder().is_empty());
    }

    #[test]
    fn overwrite_policy_keeps_last_declaration() {
        let routes: Vec<Route<()>> = vec![Route::handle("dup", ok), Route::handle("dup", accepted)];
        let table = compile(routes).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn branch_parent_and_leaf_collide() {
        let routes: Vec<Route<()>> = vec![
            Route::handle("api", ok),
            Route::literal("api").nest([Route::handle("v1", ok)]),
        ];
        let err = compile_with(routes, DuplicatePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            CompileError::DuplicatePrefix {
                path: "/api".to_owned()
            }
        );
    }

    #[test]
    fn reject_policy_accepts_distinct_paths() {
        let routes: Vec<Route<()>> = vec![Route::handle("a", ok), Route::handle("b", ok)];
        assert!(compile_with(routes, DuplicatePolicy::Reject).is_ok());
    }

    #[test]
    fn malformed_prefixes_are_rejected() {
        for bad in ["", "/api", "a//b", "search?q", "page#top"] {
            let result = compile(vec![Route::<()>::literal(bad)]);
            assert!(
                matches!(result, Err(CompileError::InvalidPrefix { ref prefix, .. }) if prefix == bad),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn malformed_child_prefix_is_rejected() {
        let routes: Vec<Route<()>> = vec![Route::literal("api").nest([Route::handle("/v1", ok)])];
        assert!(matches!(
            compile(routes),
            Err(CompileError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn trailing_separator_is_allowed_on_leaves() {
        let table = compile(vec![Route::handle("files/", ok)]).unwrap();
        assert!(table.lookup(b"/files").is_none());
        assert_eq!(table.lookup(b"/files/a.txt").unwrap().remainder(), b"a.txt");
    }

    #[test]
    fn trailing_separator_is_rejected_on_parents() {
        let routes: Vec<Route<()>> = vec![Route::literal("files/").nest([Route::handle("x", ok)])];
        let err = compile(routes).unwrap_err();
        assert!(
            matches!(err, CompileError::InvalidPrefix { ref prefix, .. } if prefix == "files/"),
            "{err:?}"
        );

        let nested: Vec<Route<()>> = vec![Route::literal("api").nest([
            Route::handle("v1/", ok).nest([Route::handle("users", ok)]),
        ])];
        assert!(matches!(
            compile(nested),
            Err(CompileError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn literal_groups_can_be_reopened() {
        let routes: Vec<Route<()>> = vec![
            Route::literal("api").nest([Route::handle("a", ok)]),
            Route::literal("api").nest([Route::handle("b", accepted)]),
        ];
        let table = compile(routes).unwrap();
        assert_eq!(table.paths(), ["/api", "/api/a", "/api/b"]);
    }

    #[test]
    fn policy_deserializes_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: DuplicatePolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"reject\"").unwrap();
        assert_eq!(w.policy, DuplicatePolicy::Reject);
    }
}
