use crate::domains::core::cache::MemoryCache;
use crate::domains::selection::repository::KeyValueStore;
use crate::domains::selection::types::*;
use crate::errors::{ServiceResult, StorageError};
use chrono::Utc;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Persists column inclusion, order and widths per entity type and tenant.
///
/// Each kind has its own cache, keyed by storage key, consulted before the
/// store. A cached `None` records that nothing was saved.
pub struct SelectionStore {
    store: Arc<dyn KeyValueStore>,
    selections: MemoryCache<Option<SelectionState>>,
    orders: MemoryCache<Option<ColumnOrderState>>,
    widths: MemoryCache<Option<ColumnWidthState>>,
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("store", &"<KeyValueStore>")
            .finish()
    }
}

impl SelectionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            selections: MemoryCache::new(),
            orders: MemoryCache::new(),
            widths: MemoryCache::new(),
        }
    }

    pub async fn get_field_selections(&self, entity_type: &str, tenant_slug: Option<&str>) -> Option<SelectionState> {
        let key = SelectionKind::FieldSelections.storage_key(entity_type, tenant_slug);
        self.load(&self.selections, &key).await
    }

    pub async fn save_field_selections(
        &self,
        entity_type: &str,
        tenant_slug: Option<&str>,
        selections: Vec<FieldSelection>,
    ) {
        let key = SelectionKind::FieldSelections.storage_key(entity_type, tenant_slug);
        let state = SelectionState {
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            last_updated: Utc::now(),
            selections,
        };
        self.save(&self.selections, &key, state).await;
    }

    pub async fn get_column_order(&self, entity_type: &str, tenant_slug: Option<&str>) -> Option<ColumnOrderState> {
        let key = SelectionKind::ColumnOrder.storage_key(entity_type, tenant_slug);
        self.load(&self.orders, &key).await
    }

    pub async fn save_column_order(&self, entity_type: &str, tenant_slug: Option<&str>, column_order: Vec<String>) {
        let key = SelectionKind::ColumnOrder.storage_key(entity_type, tenant_slug);
        let state = ColumnOrderState {
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            last_updated: Utc::now(),
            column_order,
        };
        self.save(&self.orders, &key, state).await;
    }

    pub async fn get_column_widths(&self, entity_type: &str, tenant_slug: Option<&str>) -> Option<ColumnWidthState> {
        let key = SelectionKind::ColumnWidths.storage_key(entity_type, tenant_slug);
        self.load(&self.widths, &key).await
    }

    pub async fn save_column_widths(
        &self,
        entity_type: &str,
        tenant_slug: Option<&str>,
        column_widths: HashMap<String, u32>,
    ) {
        let key = SelectionKind::ColumnWidths.storage_key(entity_type, tenant_slug);
        let state = ColumnWidthState {
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            last_updated: Utc::now(),
            column_widths,
        };
        self.save(&self.widths, &key, state).await;
    }

    /// Record one column resize, keeping the other saved widths.
    pub async fn save_column_width(&self, entity_type: &str, tenant_slug: Option<&str>, field_key: &str, width: u32) {
        let mut widths = self
            .get_column_widths(entity_type, tenant_slug)
            .await
            .map(|state| state.column_widths)
            .unwrap_or_default();
        widths.insert(field_key.to_string(), width);
        self.save_column_widths(entity_type, tenant_slug, widths).await;
    }

    /// Remove saved customization. Returns the number of storage keys removed.
    pub async fn clear(&self, scope: ClearScope) -> ServiceResult<usize> {
        let keys: Vec<String> = match &scope {
            ClearScope::Tenant { entity_type, tenant_slug } => {
                let candidates: Vec<String> = SelectionKind::ALL
                    .iter()
                    .map(|kind| kind.storage_key(entity_type, Some(tenant_slug)))
                    .collect();
                let existing = self.store.keys().await?;
                candidates.into_iter().filter(|k| existing.contains(k)).collect()
            }
            ClearScope::EntityType(entity_type) => self
                .store
                .keys()
                .await?
                .into_iter()
                .filter(|key| SelectionKind::ALL.iter().any(|kind| kind.matches_entity(key, entity_type)))
                .collect(),
            ClearScope::All => self
                .store
                .keys()
                .await?
                .into_iter()
                .filter(|key| SelectionKind::matches_any(key))
                .collect(),
        };

        if !keys.is_empty() {
            self.store.remove(&keys).await?;
        }

        match &scope {
            ClearScope::Tenant { entity_type, tenant_slug } => {
                for kind in SelectionKind::ALL {
                    let key = kind.storage_key(entity_type, Some(tenant_slug));
                    self.selections.invalidate(&key).await;
                    self.orders.invalidate(&key).await;
                    self.widths.invalidate(&key).await;
                }
            }
            ClearScope::EntityType(entity_type) => {
                let matches = |key: &str| SelectionKind::ALL.iter().any(|kind| kind.matches_entity(key, entity_type));
                self.selections.invalidate_where(matches).await;
                self.orders.invalidate_where(matches).await;
                self.widths.invalidate_where(matches).await;
            }
            ClearScope::All => {
                self.selections.clear().await;
                self.orders.clear().await;
                self.widths.clear().await;
            }
        }

        debug!("Cleared {} selection keys for {:?}", keys.len(), scope);
        Ok(keys.len())
    }

    async fn load<T>(&self, cache: &MemoryCache<Option<T>>, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Clone + Send + Sync,
    {
        if let Some(cached) = cache.get(key).await {
            return cached;
        }

        let loaded = match self.store.get(key).await {
            Ok(Some(value)) => serde_json::from_value::<T>(value)
                .map_err(|e| StorageError::corrupt(key, e)),
            Ok(None) => {
                cache.set(key, None).await;
                return None;
            }
            Err(e) => Err(e),
        };

        match loaded {
            Ok(state) => {
                cache.set(key, Some(state.clone())).await;
                Some(state)
            }
            Err(e) => {
                warn!("Ignoring saved state for {}: {}", key, e);
                None
            }
        }
    }

    async fn save<T>(&self, cache: &MemoryCache<Option<T>>, key: &str, state: T)
    where
        T: Serialize + Clone + Send + Sync,
    {
        cache.set(key, Some(state.clone())).await;

        let value = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize state for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key, value).await {
            error!("Failed to persist {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::selection::repository::InMemoryKeyValueStore;
    use crate::errors::StorageResult;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts reads and can be told to fail
    #[derive(Default)]
    pub struct FlakyStore {
        inner: InMemoryKeyValueStore,
        pub fail_reads: bool,
        pub fail_writes: bool,
        pub reads: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(StorageError::read(key, "quota exceeded"));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
            if self.fail_writes {
                return Err(StorageError::write(key, "quota exceeded"));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, keys: &[String]) -> StorageResult<()> {
            self.inner.remove(keys).await
        }

        async fn keys(&self) -> StorageResult<Vec<String>> {
            self.inner.keys().await
        }
    }

    fn selection(key: &str, include: bool) -> FieldSelection {
        FieldSelection {
            key: key.to_string(),
            include,
        }
    }

    #[tokio::test]
    async fn test_tenant_and_global_keys_are_separate() {
        let store = SelectionStore::new(Arc::new(InMemoryKeyValueStore::new()));
        store.save_column_order("issue", Some("acme"), vec!["title".into()]).await;
        store.save_column_order("issue", None, vec!["state".into()]).await;

        let tenant = store.get_column_order("issue", Some("acme")).await.unwrap();
        assert_eq!(tenant.column_order, vec!["title".to_string()]);
        assert_eq!(tenant.tenant_slug.as_deref(), Some("acme"));
        let global = store.get_column_order("issue", None).await.unwrap();
        assert_eq!(global.column_order, vec!["state".to_string()]);
        assert!(store.get_column_order("issue", Some("globex")).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_is_consulted_before_storage() {
        let backend = Arc::new(FlakyStore::default());
        let store = SelectionStore::new(backend.clone());

        assert!(store.get_field_selections("issue", Some("acme")).await.is_none());
        assert!(store.get_field_selections("issue", Some("acme")).await.is_none());
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);

        store.save_field_selections("issue", Some("acme"), vec![selection("title", false)]).await;
        let state = store.get_field_selections("issue", Some("acme")).await.unwrap();
        assert_eq!(state.selections, vec![selection("title", false)]);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persisted_state_is_read_by_a_fresh_instance() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        SelectionStore::new(backend.clone())
            .save_column_width("issue", Some("acme"), "title", 320)
            .await;

        let raw = backend.get("column-widths-issue-acme").await.unwrap().unwrap();
        assert_eq!(raw["columnWidths"]["title"], json!(320));
        assert!(raw.get("lastUpdated").is_some());

        let fresh = SelectionStore::new(backend);
        fresh.save_column_width("issue", Some("acme"), "state", 90).await;
        let widths = fresh.get_column_widths("issue", Some("acme")).await.unwrap().column_widths;
        assert_eq!(widths.get("title"), Some(&320));
        assert_eq!(widths.get("state"), Some(&90));
    }

    #[tokio::test]
    async fn test_read_failure_is_treated_as_empty() {
        let backend = Arc::new(FlakyStore {
            fail_reads: true,
            ..Default::default()
        });
        let store = SelectionStore::new(backend);
        assert!(store.get_column_widths("issue", Some("acme")).await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_treated_as_empty() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        backend.set("column-order-issue-acme", json!("garbage")).await.unwrap();
        let store = SelectionStore::new(backend);
        assert!(store.get_column_order("issue", Some("acme")).await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed_but_cached() {
        let backend = Arc::new(FlakyStore {
            fail_writes: true,
            ..Default::default()
        });
        let store = SelectionStore::new(backend.clone());
        store.save_column_order("issue", Some("acme"), vec!["title".into()]).await;

        assert!(store.get_column_order("issue", Some("acme")).await.is_some());
        assert!(backend.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_scopes() {
        let backend = Arc::new(InMemoryKeyValueStore::new());
        backend.set("session-token", json!("keep")).await.unwrap();
        let store = SelectionStore::new(backend.clone());

        for tenant in [Some("acme"), Some("globex"), None] {
            store.save_column_order("issue", tenant, vec!["title".into()]).await;
            store.save_field_selections("issue", tenant, vec![selection("title", true)]).await;
        }
        store.save_column_order("user", Some("acme"), vec!["name".into()]).await;
        store.save_column_order("users", Some("acme"), vec!["name".into()]).await;

        let removed = store
            .clear(ClearScope::Tenant {
                entity_type: "issue".to_string(),
                tenant_slug: "acme".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_column_order("issue", Some("acme")).await.is_none());
        assert!(store.get_column_order("issue", Some("globex")).await.is_some());

        let removed = store.clear(ClearScope::EntityType("issue".to_string())).await.unwrap();
        assert_eq!(removed, 4);
        assert!(store.get_column_order("issue", None).await.is_none());

        let removed = store.clear(ClearScope::EntityType("user".to_string())).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_column_order("users", Some("acme")).await.is_some());

        let removed = store.clear(ClearScope::All).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.keys().await.unwrap(), vec!["session-token".to_string()]);
        assert!(store.get_column_order("users", Some("acme")).await.is_none());
    }
}
