//! Registry of counting and embedding backends plus the caches that hold
//! their instances.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = BackendRegistry::new();
//! registry.register_counter(Arc::new(OpenAiCounterFactory));
//!
//! let counter = registry.token_counter("openai", "gpt-4o", None)?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::{BackendError, Embedder, EmbedderFactory, TokenCounter, TokenCounterFactory};
use crate::cache::ModelInstanceCache;

type CounterCache = ModelInstanceCache<dyn TokenCounter>;
type EmbedderCache = ModelInstanceCache<dyn Embedder>;

static SHARED_COUNTERS: OnceLock<Arc<CounterCache>> = OnceLock::new();
static SHARED_EMBEDDERS: OnceLock<Arc<EmbedderCache>> = OnceLock::new();

fn shared_counters() -> Arc<CounterCache> {
    Arc::clone(SHARED_COUNTERS.get_or_init(|| Arc::new(ModelInstanceCache::new())))
}

fn shared_embedders() -> Arc<EmbedderCache> {
    Arc::clone(SHARED_EMBEDDERS.get_or_init(|| Arc::new(ModelInstanceCache::new())))
}

/// Available backend factories and the instance caches they fill.
///
/// Counter factories are keyed by provider name; at most one embedder factory
/// is registered. Cloning a registry shares its caches.
#[derive(Clone)]
pub struct BackendRegistry {
    counters: BTreeMap<String, Arc<dyn TokenCounterFactory>>,
    embedder: Option<Arc<dyn EmbedderFactory>>,
    counter_cache: Arc<CounterCache>,
    embedder_cache: Arc<EmbedderCache>,
}

impl BackendRegistry {
    /// An empty registry backed by the process-wide caches.
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
            embedder: None,
            counter_cache: shared_counters(),
            embedder_cache: shared_embedders(),
        }
    }

    /// An empty registry with caches of its own.
    pub fn isolated() -> Self {
        Self {
            counter_cache: Arc::new(ModelInstanceCache::new()),
            embedder_cache: Arc::new(ModelInstanceCache::new()),
            ..Self::new()
        }
    }

    /// Register a counter factory, replacing any factory for the same provider.
    pub fn register_counter(&mut self, factory: Arc<dyn TokenCounterFactory>) {
        self.counters.insert(factory.provider().to_string(), factory);
    }

    /// Builder form of [`register_counter`](Self::register_counter).
    pub fn with_counter(mut self, factory: Arc<dyn TokenCounterFactory>) -> Self {
        self.register_counter(factory);
        self
    }

    pub fn register_embedder(&mut self, factory: Arc<dyn EmbedderFactory>) {
        self.embedder = Some(factory);
    }

    pub fn with_embedder(mut self, factory: Arc<dyn EmbedderFactory>) -> Self {
        self.register_embedder(factory);
        self
    }

    /// Registered provider names, sorted.
    pub fn available_providers(&self) -> Vec<&str> {
        self.counters.keys().map(String::as_str).collect()
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.counters.contains_key(provider)
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Get or create the counter for `provider`.
    ///
    /// # Arguments
    /// * `provider` - Registered provider name
    /// * `model` - Provider-specific model identifier
    /// * `encoding` - Optional encoding override
    pub fn token_counter(
        &self,
        provider: &str,
        model: &str,
        encoding: Option<&str>,
    ) -> Result<Arc<dyn TokenCounter>, BackendError> {
        let factory = self.counters.get(provider).ok_or_else(|| {
            BackendError::NotConfigured(format!(
                "Unknown token provider: '{}'. Available: {:?}",
                provider,
                self.available_providers()
            ))
        })?;

        let key = factory.cache_key(model, encoding);
        self.counter_cache
            .get_or_create(&key, || factory.create(model, encoding))
    }

    /// Get or create the embedder for `model`.
    pub fn embedder(&self, model: &str) -> Result<Arc<dyn Embedder>, BackendError> {
        let factory = self.embedder.as_ref().ok_or_else(|| {
            BackendError::NotConfigured("No embedding backend registered".to_string())
        })?;

        let key = format!("embedder:{model}");
        self.embedder_cache
            .get_or_create(&key, || factory.create(model))
    }

    pub fn counter_cache(&self) -> &Arc<ModelInstanceCache<dyn TokenCounter>> {
        &self.counter_cache
    }

    pub fn embedder_cache(&self) -> &Arc<ModelInstanceCache<dyn Embedder>> {
        &self.embedder_cache
    }

    /// Trim both caches to at most `max_entries` each.
    pub fn shrink_caches(&self, max_entries: usize) -> usize {
        self.counter_cache.shrink_to(max_entries) + self.embedder_cache.shrink_to(max_entries)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("providers", &self.available_providers())
            .field("embedder", &self.has_embedder())
            .field("cached_counters", &self.counter_cache.len())
            .field("cached_embedders", &self.embedder_cache.len())
            .finish()
    }
}
