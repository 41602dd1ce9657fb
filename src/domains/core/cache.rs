use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Composite cache key for tenant-scoped entries.
pub fn scoped_key(entity_type: &str, tenant_slug: Option<&str>) -> String {
    match tenant_slug {
        Some(tenant) => format!("{}:{}", entity_type, tenant),
        None => entity_type.to_string(),
    }
}

/// In-memory cache keyed by composite string.
///
/// Entries never expire on their own; callers invalidate explicitly. Cloning
/// the cache yields another handle to the same entries.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Arc<RwLock<HashMap<String, V>>>,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<V: Clone + Send + Sync> MemoryCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: V) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Remove one entry, returning it if present.
    pub async fn invalidate(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key)
    }

    /// Remove every entry whose key satisfies `predicate`. Returns the number removed.
    pub async fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
