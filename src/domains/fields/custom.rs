use crate::domains::core::cache::{scoped_key, MemoryCache};
use crate::domains::fields::types::{CustomFieldConfig, DetectedField};
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Source of tenant custom-field definitions.
///
/// Returns the raw response body so that an unexpected shape can be treated
/// as "no custom fields" rather than a parse failure.
#[async_trait]
pub trait CustomFieldSource: Send + Sync {
    async fn fetch_custom_fields(&self, entity_type: &str, tenant_slug: &str) -> ServiceResult<Value>;
}

/// Custom-field source backed by the vendor's configuration endpoint
pub struct ApiCustomFieldSource {
    client: Client,
    base_url: String,
}

impl ApiCustomFieldSource {
    pub fn new(base_url: &str, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, entity_type: &str, tenant_slug: &str) -> String {
        format!(
            "{}/customfields?parent={}&tenantSlug={}",
            self.base_url,
            urlencoding::encode(entity_type),
            urlencoding::encode(tenant_slug)
        )
    }
}

#[async_trait]
impl CustomFieldSource for ApiCustomFieldSource {
    async fn fetch_custom_fields(&self, entity_type: &str, tenant_slug: &str) -> ServiceResult<Value> {
        let url = self.endpoint(entity_type, tenant_slug);
        debug!("Fetching custom fields from {}", url);

        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to get error details".to_string());

            Err(ServiceError::ExternalService(format!(
                "Server returned error {}: {}",
                status, error_text
            )))
        }
    }
}

/// Retrieves and caches tenant custom-field definitions per entity type
pub struct CustomFieldFetcher {
    source: Arc<dyn CustomFieldSource>,
    cache: MemoryCache<Vec<CustomFieldConfig>>,
}

impl CustomFieldFetcher {
    pub fn new(source: Arc<dyn CustomFieldSource>) -> Self {
        Self::with_cache(source, MemoryCache::new())
    }

    pub fn with_cache(source: Arc<dyn CustomFieldSource>, cache: MemoryCache<Vec<CustomFieldConfig>>) -> Self {
        Self { source, cache }
    }

    /// Custom fields for an entity type as detected fields.
    ///
    /// Without a tenant there are no custom fields. Fetch or parse failures are
    /// logged and yield an empty list.
    pub async fn get_custom_fields(&self, entity_type: &str, tenant_slug: Option<&str>) -> Vec<DetectedField> {
        let Some(tenant) = tenant_slug else {
            return Vec::new();
        };

        let definitions = match self.load_definitions(entity_type, tenant).await {
            Ok(definitions) => definitions,
            Err(e) => {
                warn!(
                    "Failed to fetch custom fields for {} (tenant {}): {}",
                    entity_type, tenant, e
                );
                return Vec::new();
            }
        };

        definitions
            .into_iter()
            .filter(CustomFieldConfig::is_visible)
            .map(DetectedField::custom)
            .collect()
    }

    /// Full cached definition list, hidden fields included. Never hits the network.
    pub async fn cached_definitions(&self, entity_type: &str, tenant_slug: &str) -> Option<Vec<CustomFieldConfig>> {
        self.cache.get(&scoped_key(entity_type, Some(tenant_slug))).await
    }

    pub async fn invalidate(&self, entity_type: &str, tenant_slug: &str) {
        self.cache.invalidate(&scoped_key(entity_type, Some(tenant_slug))).await;
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    async fn load_definitions(&self, entity_type: &str, tenant: &str) -> ServiceResult<Vec<CustomFieldConfig>> {
        let key = scoped_key(entity_type, Some(tenant));
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let body = self.source.fetch_custom_fields(entity_type, tenant).await?;
        let definitions = parse_definitions(body);
        debug!(
            "Cached {} custom field definitions for {}",
            definitions.len(),
            key
        );
        self.cache.set(key, definitions.clone()).await;
        Ok(definitions)
    }
}

fn parse_definitions(body: Value) -> Vec<CustomFieldConfig> {
    let Value::Array(items) = body else {
        warn!("Custom field response is not an array, treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<CustomFieldConfig>(item) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Skipping malformed custom field definition: {}", e);
                None
            }
        })
        .collect()
}
