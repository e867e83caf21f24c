use std::sync::Arc;

use crate::core::cache::ViewCache;
use crate::core::{config::Settings, redis::RedisHandle};
use crate::db::paths::CollectionPaths;
use crate::db::store::DocumentStore;
use crate::services::gemini::VocabularyGenerator;
use crate::services::recognition::Recognizer;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    paths: CollectionPaths,
    redis: RedisHandle,
    cache: ViewCache,
    generator: Arc<dyn VocabularyGenerator>,
    recognizer: Arc<dyn Recognizer>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        redis: RedisHandle,
        generator: Arc<dyn VocabularyGenerator>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Self {
        let app_id = settings.store().app_id.clone();
        let cache = ViewCache::new(redis.clone(), app_id.clone(), settings.store().cache_ttl_seconds);
        let paths = CollectionPaths::new(app_id);
        Self {
            inner: Arc::new(InnerState { settings, store, paths, redis, cache, generator, recognizer }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn paths(&self) -> &CollectionPaths {
        &self.inner.paths
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn cache(&self) -> &ViewCache {
        &self.inner.cache
    }

    pub(crate) fn generator(&self) -> &dyn VocabularyGenerator {
        self.inner.generator.as_ref()
    }

    pub(crate) fn recognizer(&self) -> &dyn Recognizer {
        self.inner.recognizer.as_ref()
    }
}
