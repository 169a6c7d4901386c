//! Compiled query cache.
//!
//! Compiling a query means lexing, the variable prescan, parsing and constant
//! folding. Tools that run the same handful of queries over many documents
//! keep them here instead.

use std::{num::NonZeroUsize, sync::Mutex};

use lru::LruCache;
use tracing::debug;

use crate::{
    ast::CompiledQuery,
    evaluator::Evaluator,
    parser::{QueryError, compile},
    value::Node,
};

pub const DEFAULT_CAPACITY: usize = 64;

/// Thread-safe LRU cache from query text to its compiled form.
///
/// Two threads missing on the same query both compile it; the second insert
/// replaces the first with an equal value.
pub struct QueryCache {
    cache: Mutex<LruCache<String, CompiledQuery>>,
}

impl QueryCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Compiled form of `query`, compiling on a miss. Failed compilations are
    /// not cached.
    pub fn get_or_compile(&self, query: &str) -> Result<CompiledQuery, QueryError> {
        if let Some(hit) = self.lock().get(query) {
            debug!(query, "query cache hit");
            return Ok(hit.clone());
        }
        debug!(query, "query cache miss");

        // compile without holding the lock
        let compiled = compile(query)?;
        if let Some((evicted, _)) = self.lock().push(query.to_string(), compiled.clone())
            && evicted != query
        {
            debug!(evicted = %evicted, "query cache eviction");
        }
        Ok(compiled)
    }

    pub fn contains(&self, query: &str) -> bool {
        self.lock().contains(query)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CompiledQuery>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        QueryCache::new(DEFAULT_CAPACITY)
    }
}

/// Compiles queries through a [`QueryCache`] and runs them.
///
/// # Examples
///
/// ```
/// use remespath::{RemesParser, json_parser::parse_json};
///
/// let remes = RemesParser::default();
/// let doc = parse_json(r#"{"a": [1, 2, 3], "b": {"c": 4}}"#).unwrap();
/// let out = remes.search("@.a[@ > 1]", &doc).unwrap();
/// assert_eq!(remespath::to_json(&out), "[2, 3]");
/// ```
#[derive(Default)]
pub struct RemesParser {
    cache: QueryCache,
}

impl RemesParser {
    pub fn new(capacity: usize) -> Self {
        RemesParser {
            cache: QueryCache::new(capacity),
        }
    }

    pub fn compile(&self, query: &str) -> Result<CompiledQuery, QueryError> {
        self.cache.get_or_compile(query)
    }

    /// Run `query` against `input` with a freshly seeded evaluator.
    ///
    /// `input` is never modified. A mutation query returns the edited copy.
    pub fn search(&self, query: &str, input: &Node) -> Result<Node, QueryError> {
        self.search_with(&mut Evaluator::new(), query, input)
    }

    /// Like [`search`](Self::search), but with a caller-supplied evaluator
    /// (for a seeded random number generator, say).
    pub fn search_with(&self, evaluator: &mut Evaluator, query: &str, input: &Node) -> Result<Node, QueryError> {
        let compiled = self.compile(query)?;
        Ok(evaluator.run(&compiled, input)?)
    }

    /// Run `query` with its mutations applied to `input` in place.
    pub fn search_mut(&self, query: &str, input: &mut Node) -> Result<Node, QueryError> {
        let compiled = self.compile(query)?;
        Ok(Evaluator::new().run_mut(&compiled, input)?)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}
