use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::Result;

/// What a predicate sees of one (subscriber, file) pair
#[derive(Debug, Clone, Copy)]
pub struct PredicateContext<'a> {
    /// Parameter string from the subscriber's filter spec
    pub params: &'a str,
    pub file_path: &'a Path,
    pub file_id: &'a str,
    pub file_version: u32,
    pub mime_type: &'a str,
}

/// A filter the engine can resolve by name.
///
/// An `Err` return rejects the file for that subscriber in this cycle.
pub trait FilterPredicate: Send + Sync + 'static {
    fn evaluate(
        &self,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool>;
}

impl<F> FilterPredicate for F
where
    F: Fn(&PredicateContext<'_>) -> Result<bool> + Send + Sync + 'static,
{
    fn evaluate(
        &self,
        ctx: &PredicateContext<'_>,
    ) -> Result<bool> {
        self(ctx)
    }
}

/// Name-to-predicate lookup, populated before the engine starts
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    predicates: HashMap<String, Arc<dyn FilterPredicate>>,
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let mut names: Vec<_> = self.predicates.keys().collect();
        names.sort();
        f.debug_struct("PredicateRegistry").field("names", &names).finish()
    }
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `mime_type` and `file_id_pattern`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(super::MIME_TYPE_PREDICATE, super::MimeTypePredicate);
        registry.register(
            super::FILE_ID_PATTERN_PREDICATE,
            super::FileIdPatternPredicate::default(),
        );
        registry
    }

    /// Registers or replaces a predicate.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        predicate: impl FilterPredicate,
    ) {
        self.predicates.insert(name.into(), Arc::new(predicate));
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<Arc<dyn FilterPredicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.predicates.contains_key(name)
    }
}
