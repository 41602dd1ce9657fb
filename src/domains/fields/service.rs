use crate::config::ServiceConfig;
use crate::domains::core::cache::{scoped_key, MemoryCache};
use crate::domains::fields::catalog::standard_fields;
use crate::domains::fields::custom::CustomFieldFetcher;
use crate::domains::fields::discovery::FieldDiscoverer;
use crate::domains::fields::types::{DetectedField, FieldDetectionResult, FieldMapping};
use crate::domains::selection::service::SelectionStore;
use crate::domains::selection::types::FieldSelection;
use crate::errors::ServiceResult;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type SharedDetection = Shared<BoxFuture<'static, ServiceResult<FieldDetectionResult>>>;

const CUSTOM_PREFIX: &str = "custom.";

/// Combines catalog, custom and discovered fields into one mapping list and
/// overlays the saved selection, order and widths.
struct DetectionPipeline {
    custom_fields: Arc<CustomFieldFetcher>,
    discoverer: FieldDiscoverer,
    selections: Arc<SelectionStore>,
    results: MemoryCache<FieldDetectionResult>,
}

impl DetectionPipeline {
    async fn detect(
        &self,
        entity_type: &str,
        tenant_slug: Option<&str>,
        sample_data: &[Value],
    ) -> ServiceResult<FieldDetectionResult> {
        let standard = standard_fields(entity_type);
        let custom = self.custom_fields.get_custom_fields(entity_type, tenant_slug).await;
        let discovered = self.discoverer.discover(sample_data, &standard, &custom)?;

        debug!(
            "Detected {} standard, {} custom, {} discovered fields for {}",
            standard.len(),
            custom.len(),
            discovered.len(),
            scoped_key(entity_type, tenant_slug)
        );

        let (standard_count, custom_count, discovered_count) =
            (standard.len(), custom.len(), discovered.len());
        let fields = dedupe_by_key(standard.into_iter().chain(custom).chain(discovered));

        let mut mappings: Vec<FieldMapping> = fields
            .iter()
            .enumerate()
            .map(|(order, field)| FieldMapping::from_detected(field, order))
            .collect();
        self.apply_overlays(entity_type, tenant_slug, &mut mappings).await;

        let result = FieldDetectionResult {
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            fields,
            mappings,
            standard_count,
            custom_count,
            discovered_count,
            detected_at: Utc::now(),
        };
        self.results
            .set(scoped_key(entity_type, tenant_slug), result.clone())
            .await;
        Ok(result)
    }

    /// Saved state is read only under the caller's own `(entity_type, tenant_slug)`
    /// key; state saved without a tenant never applies to a tenant.
    async fn apply_overlays(&self, entity_type: &str, tenant_slug: Option<&str>, mappings: &mut Vec<FieldMapping>) {
        let store = &self.selections;

        if let Some(state) = store.get_field_selections(entity_type, tenant_slug).await {
            apply_selection(mappings, &state.selections);
        }
        if let Some(state) = store.get_column_order(entity_type, tenant_slug).await {
            apply_order(mappings, &state.column_order);
        }
        if let Some(state) = store.get_column_widths(entity_type, tenant_slug).await {
            apply_widths(mappings, &state.column_widths);
        }
    }
}

/// First occurrence of a key wins, so source priority is preserved.
fn dedupe_by_key(fields: impl Iterator<Item = DetectedField>) -> Vec<DetectedField> {
    let mut seen = HashSet::new();
    fields.filter(|f| seen.insert(f.key.clone())).collect()
}

/// Saved include flags by exact key, then with the `custom.` prefix
/// stripped or added. Unmatched saved keys are ignored.
fn apply_selection(mappings: &mut [FieldMapping], saved: &[FieldSelection]) {
    let by_key: HashMap<&str, bool> = saved.iter().map(|s| (s.key.as_str(), s.include)).collect();

    for mapping in mappings.iter_mut() {
        let include = by_key.get(mapping.key.as_str()).copied().or_else(|| {
            match mapping.key.strip_prefix(CUSTOM_PREFIX) {
                Some(bare) => by_key.get(bare).copied(),
                None => by_key
                    .get(format!("{}{}", CUSTOM_PREFIX, mapping.key).as_str())
                    .copied(),
            }
        });
        if let Some(include) = include {
            mapping.include = include;
        }
    }
}

/// Saved keys take their saved index; the rest follow in their current order.
/// `order` is renumbered densely afterwards.
fn apply_order(mappings: &mut Vec<FieldMapping>, saved: &[String]) {
    let position: HashMap<&str, usize> = saved
        .iter()
        .enumerate()
        .map(|(index, key)| (key.as_str(), index))
        .collect();

    mappings.sort_by_key(|m| m.order);
    let mut keyed: Vec<(usize, usize, FieldMapping)> = mappings
        .drain(..)
        .enumerate()
        .map(|(original, mapping)| match position.get(mapping.key.as_str()) {
            Some(index) => (0, *index, mapping),
            None => (1, original, mapping),
        })
        .collect();
    keyed.sort_by_key(|(group, index, _)| (*group, *index));

    mappings.extend(keyed.into_iter().map(|(_, _, mapping)| mapping));
    for (order, mapping) in mappings.iter_mut().enumerate() {
        mapping.order = order;
    }
}

fn apply_widths(mappings: &mut [FieldMapping], saved: &HashMap<String, u32>) {
    for mapping in mappings.iter_mut() {
        if let Some(width) = saved.get(&mapping.key).copied().filter(|w| *w > 0) {
            mapping.width = width;
        }
    }
}

/// Field detection entry point.
///
/// Concurrent requests for the same entity type and tenant share one
/// detection run; later callers receive the first caller's result.
pub struct FieldDetectionService {
    pipeline: Arc<DetectionPipeline>,
    in_flight: Arc<Mutex<HashMap<String, SharedDetection>>>,
    stale_after: Duration,
}

impl FieldDetectionService {
    pub fn new(
        custom_fields: Arc<CustomFieldFetcher>,
        selections: Arc<SelectionStore>,
        discoverer: FieldDiscoverer,
        stale_after: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(DetectionPipeline {
                custom_fields,
                discoverer,
                selections,
                results: MemoryCache::new(),
            }),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stale_after,
        }
    }

    pub fn from_config(
        config: &ServiceConfig,
        custom_fields: Arc<CustomFieldFetcher>,
        selections: Arc<SelectionStore>,
    ) -> Self {
        Self::new(
            custom_fields,
            selections,
            FieldDiscoverer::new(config.sample_size),
            config.detection_stale_after,
        )
    }

    /// Detect fields and return mappings with saved customization applied.
    /// Any failure other than the custom-field fetch fails the whole detection.
    pub async fn detect_fields(
        &self,
        entity_type: &str,
        tenant_slug: Option<&str>,
        sample_data: &[Value],
    ) -> ServiceResult<FieldDetectionResult> {
        let key = scoped_key(entity_type, tenant_slug);

        let detection = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!("Joining in-flight field detection for {}", key);
                    existing.clone()
                }
                None => {
                    let pipeline = Arc::clone(&self.pipeline);
                    let entity_type = entity_type.to_string();
                    let tenant_slug = tenant_slug.map(str::to_string);
                    let sample_data = sample_data.to_vec();
                    let detection = async move {
                        pipeline
                            .detect(&entity_type, tenant_slug.as_deref(), &sample_data)
                            .await
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.clone(), detection.clone());
                    detection
                }
            }
        };

        let result = detection.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key).is_some_and(|current| current.ptr_eq(&detection)) {
            in_flight.remove(&key);
        }
        result
    }

    /// Last detection result if it is still fresh, otherwise a new detection.
    pub async fn fields_for(
        &self,
        entity_type: &str,
        tenant_slug: Option<&str>,
        sample_data: &[Value],
    ) -> ServiceResult<FieldDetectionResult> {
        if let Some((result, false)) = self.last_result(entity_type, tenant_slug).await {
            return Ok(result);
        }
        self.detect_fields(entity_type, tenant_slug, sample_data).await
    }

    /// Last result and whether it is past the staleness window. Stale
    /// results are kept until invalidated.
    pub async fn last_result(&self, entity_type: &str, tenant_slug: Option<&str>) -> Option<(FieldDetectionResult, bool)> {
        let result = self
            .pipeline
            .results
            .get(&scoped_key(entity_type, tenant_slug))
            .await?;
        let stale = result.is_stale(Utc::now(), self.stale_after);
        Some((result, stale))
    }

    pub async fn invalidate(&self, entity_type: &str, tenant_slug: Option<&str>) {
        self.pipeline
            .results
            .invalidate(&scoped_key(entity_type, tenant_slug))
            .await;
        if let Some(tenant) = tenant_slug {
            self.pipeline.custom_fields.invalidate(entity_type, tenant).await;
        }
    }

    /// Save inclusion, order and widths of `mappings` in one call.
    pub async fn persist_mappings(&self, entity_type: &str, tenant_slug: Option<&str>, mappings: &[FieldMapping]) {
        let mut ordered: Vec<&FieldMapping> = mappings.iter().collect();
        ordered.sort_by_key(|m| m.order);

        let selections = ordered
            .iter()
            .map(|m| FieldSelection {
                key: m.key.clone(),
                include: m.include,
            })
            .collect();
        let column_order = ordered.iter().map(|m| m.key.clone()).collect();
        let column_widths = ordered.iter().map(|m| (m.key.clone(), m.width)).collect();

        let store = &self.pipeline.selections;
        store.save_field_selections(entity_type, tenant_slug, selections).await;
        store.save_column_order(entity_type, tenant_slug, column_order).await;
        store.save_column_widths(entity_type, tenant_slug, column_widths).await;

        self.pipeline
            .results
            .invalidate(&scoped_key(entity_type, tenant_slug))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::fields::custom::tests::MockCustomFieldSource;
    use crate::domains::fields::types::FieldType;
    use crate::domains::selection::repository::InMemoryKeyValueStore;
    use crate::errors::{DomainError, ServiceError, ValidationError};
    use serde_json::json;

    struct Fixture {
        service: FieldDetectionService,
        source: Arc<MockCustomFieldSource>,
        selections: Arc<SelectionStore>,
    }

    fn fixture_with(source: MockCustomFieldSource, stale_after: Duration) -> Fixture {
        let source = Arc::new(source);
        let fetcher = Arc::new(CustomFieldFetcher::new(source.clone()));
        let selections = Arc::new(SelectionStore::new(Arc::new(InMemoryKeyValueStore::new())));
        let service = FieldDetectionService::new(
            fetcher,
            selections.clone(),
            FieldDiscoverer::default(),
            stale_after,
        );
        Fixture {
            service,
            source,
            selections,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockCustomFieldSource::returning(json!([
                {"name": "Region", "type": "select", "isActive": true},
                {"name": "Legacy", "type": "text", "isActive": false}
            ])),
            Duration::from_secs(20 * 60),
        )
    }

    fn sample() -> Vec<Value> {
        (0..20)
            .map(|i| {
                json!({
                    "_id": format!("i{}", i),
                    "title": "Broken login",
                    "sentiment": 0.5,
                    "custom": {"Region": "EMEA"}
                })
            })
            .collect()
    }

    fn mapping<'a>(mappings: &'a [FieldMapping], key: &str) -> &'a FieldMapping {
        mappings.iter().find(|m| m.key == key).unwrap()
    }

    #[tokio::test]
    async fn test_sources_in_priority_order_with_defaults() {
        let f = fixture();
        let result = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();

        assert_eq!(result.standard_count, 15);
        assert_eq!(result.custom_count, 1);
        assert_eq!(result.discovered_count, 1);

        let keys: Vec<&str> = result.mappings.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys[0], "_id");
        assert_eq!(keys[14], "updatedAt");
        assert_eq!(&keys[15..], &["custom.Region", "sentiment"]);
        assert!(result.mappings.iter().enumerate().all(|(i, m)| m.order == i));

        let m = &result.mappings;
        assert!(mapping(m, "_id").include);
        assert!(mapping(m, "title").include);
        assert!(!mapping(m, "_links").include);
        assert!(mapping(m, "custom.Region").include);
        assert!(!mapping(m, "sentiment").include);
        assert_eq!(mapping(m, "sentiment").field_type, FieldType::Number);
        assert_eq!(mapping(m, "sentiment").width, 100);
        assert_eq!(mapping(m, "resolvedAt").width, 120);
        assert_eq!(mapping(m, "tags").width, 250);
    }

    #[tokio::test]
    async fn test_saved_state_overlays_defaults() {
        let f = fixture();
        f.selections
            .save_field_selections(
                "issue",
                Some("acme"),
                vec![
                    FieldSelection { key: "Region".to_string(), include: false },
                    FieldSelection { key: "sentiment".to_string(), include: true },
                    FieldSelection { key: "ghost".to_string(), include: true },
                ],
            )
            .await;
        f.selections
            .save_column_order("issue", Some("acme"), vec!["title".to_string(), "sentiment".to_string()])
            .await;
        f.selections
            .save_column_widths(
                "issue",
                Some("acme"),
                HashMap::from([("title".to_string(), 320), ("body".to_string(), 0)]),
            )
            .await;

        let result = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();
        let m = &result.mappings;

        assert!(!mapping(m, "custom.Region").include);
        assert!(mapping(m, "sentiment").include);
        assert!(m.iter().all(|x| x.key != "ghost"));

        assert_eq!(m[0].key, "title");
        assert_eq!(m[1].key, "sentiment");
        assert_eq!(m[2].key, "_id");
        assert_eq!(m[3].key, "number");
        assert!(m.iter().enumerate().all(|(i, x)| x.order == i));

        assert_eq!(mapping(m, "title").width, 320);
        assert_eq!(mapping(m, "body").width, 200);
    }

    #[tokio::test]
    async fn test_persisted_mappings_round_trip() {
        let f = fixture();
        let first = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();

        let mut edited = first.mappings.clone();
        edited.swap(0, 3);
        for (order, m) in edited.iter_mut().enumerate() {
            m.order = order;
        }
        edited[5].include = !edited[5].include;
        edited[6].width = 275;

        f.service.persist_mappings("issue", Some("acme"), &edited).await;
        let second = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();
        assert_eq!(second.mappings, edited);

        f.service.persist_mappings("issue", Some("acme"), &second.mappings).await;
        let third = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();
        assert_eq!(third.mappings, second.mappings);
    }

    #[tokio::test]
    async fn test_concurrent_detection_shares_one_run() {
        let f = fixture();
        let data = sample();

        let (a, b) = tokio::join!(
            f.service.detect_fields("issue", Some("acme"), &data),
            f.service.detect_fields("issue", Some("acme"), &data)
        );

        assert_eq!(a.unwrap().mappings, b.unwrap().mappings);
        assert_eq!(f.source.call_count(), 1);
        assert!(f.service.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_field_failure_degrades_to_empty() {
        let f = fixture_with(MockCustomFieldSource::failing(), Duration::from_secs(60));
        let result = f.service.detect_fields("company", Some("acme"), &[]).await.unwrap();

        assert_eq!(result.custom_count, 0);
        assert_eq!(result.mappings.len(), result.standard_count);
    }

    #[tokio::test]
    async fn test_malformed_sample_fails_whole_detection() {
        let f = fixture();
        let data = vec![json!({"_id": "a"}), json!("not a record")];

        let result = f.service.detect_fields("issue", Some("acme"), &data).await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::Validation(ValidationError::MalformedSample { index: 1, .. })))
        ));
        assert!(f.service.last_result("issue", Some("acme")).await.is_none());
    }

    #[tokio::test]
    async fn test_stale_results_are_flagged_not_evicted() {
        let f = fixture_with(MockCustomFieldSource::returning(json!([])), Duration::ZERO);
        f.service.detect_fields("user", Some("acme"), &[]).await.unwrap();

        let (_, stale) = f.service.last_result("user", Some("acme")).await.unwrap();
        assert!(stale);

        let fresh = fixture();
        fresh.service.detect_fields("user", Some("acme"), &[]).await.unwrap();
        let (cached, stale) = fresh.service.last_result("user", Some("acme")).await.unwrap();
        assert!(!stale);

        let reused = fresh.service.fields_for("user", Some("acme"), &[]).await.unwrap();
        assert_eq!(reused.detected_at, cached.detected_at);
    }

    #[tokio::test]
    async fn test_invalidate_drops_result_and_custom_cache() {
        let f = fixture();
        f.service.detect_fields("issue", Some("acme"), &[]).await.unwrap();
        f.service.invalidate("issue", Some("acme")).await;

        assert!(f.service.last_result("issue", Some("acme")).await.is_none());
        f.service.detect_fields("issue", Some("acme"), &[]).await.unwrap();
        assert_eq!(f.source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_global_state_stays_out_of_tenant_detection() {
        let f = fixture();
        f.selections
            .save_field_selections(
                "issue",
                None,
                vec![FieldSelection { key: "title".to_string(), include: false }],
            )
            .await;
        f.selections
            .save_column_order("issue", None, vec!["state".to_string()])
            .await;

        let tenant = f.service.detect_fields("issue", Some("acme"), &[]).await.unwrap();
        assert_eq!(tenant.mappings[0].key, "_id");
        assert!(mapping(&tenant.mappings, "title").include);

        let global = f.service.detect_fields("issue", None, &[]).await.unwrap();
        assert_eq!(global.mappings[0].key, "state");
        assert!(!mapping(&global.mappings, "title").include);
    }

    #[tokio::test]
    async fn test_selection_matches_added_custom_prefix_and_prefers_exact_key() {
        let f = fixture();
        f.selections
            .save_field_selections(
                "issue",
                Some("acme"),
                vec![
                    // Field `sentiment` matched through the prefixed saved key
                    FieldSelection { key: "custom.sentiment".to_string(), include: true },
                    // Exact key wins over the bare legacy key
                    FieldSelection { key: "Region".to_string(), include: false },
                    FieldSelection { key: "custom.Region".to_string(), include: true },
                ],
            )
            .await;

        let result = f.service.detect_fields("issue", Some("acme"), &sample()).await.unwrap();
        let m = &result.mappings;

        assert!(mapping(m, "sentiment").include);
        assert!(mapping(m, "custom.Region").include);
    }
}
