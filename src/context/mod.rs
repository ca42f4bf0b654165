//! Per-request extensions — where the host injects the context the router requires.
//!
//! Every [`Request`](crate::http::Request) carries an [`Extensions`] map. The host puts
//! the per-request context value in it before dispatch, and
//! [`Application::dispatch`](crate::router::Application::dispatch) reads it back by type.
//! A request whose map lacks the expected type is a wiring defect and fails dispatch.

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
};

/// Type-keyed map of values owned by a single request.
///
/// At most one value per type is stored; inserting a second value of the same type
/// replaces the first.
///
/// ```
/// use rtrie::context::Extensions;
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct RequestId(u64);
///
/// let mut ext = Extensions::new();
/// assert!(ext.insert(RequestId(1)).is_none());
/// assert_eq!(ext.get::<RequestId>(), Some(&RequestId(1)));
/// assert_eq!(ext.insert(RequestId(2)), Some(RequestId(1)));
/// ```
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Entry>,
}

struct Entry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl Extensions {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert `value`, returning the previous value of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        let entry = Entry {
            name: type_name::<T>(),
            value: Box::new(value),
        };
        self.map
            .insert(TypeId::of::<T>(), entry)
            .and_then(|old| old.value.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Send + Sync + 'static,
    {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.map.values().map(|entry| entry.name))
            .finish()
    }
}
