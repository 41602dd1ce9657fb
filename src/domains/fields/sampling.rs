use crate::domains::export::pagination::{cap_page_limit, PageSource};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One endpoint to sample
#[derive(Clone)]
pub struct SampleRequest {
    pub entity_type: String,
    pub source: Arc<dyn PageSource>,
}

impl SampleRequest {
    pub fn new(entity_type: &str, source: Arc<dyn PageSource>) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleCollectionSummary {
    pub completed: usize,
    pub failed: usize,
    /// Sampled records by entity type, successful endpoints only
    pub samples: HashMap<String, Vec<Value>>,
    /// `(entity_type, message)` per failed endpoint
    pub errors: Vec<(String, String)>,
}

/// Collects first-page samples from several endpoints. A failing endpoint is
/// recorded in the summary and never aborts the batch.
#[derive(Debug, Clone)]
pub struct SampleCollector {
    sample_size: usize,
}

impl SampleCollector {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size: cap_page_limit(sample_size),
        }
    }

    pub async fn collect(&self, requests: &[SampleRequest]) -> SampleCollectionSummary {
        let mut summary = SampleCollectionSummary::default();

        for request in requests {
            match request.source.fetch_page(0, self.sample_size).await {
                Ok(page) => {
                    debug!(
                        "Sampled {} records for {}",
                        page.data.len(),
                        request.entity_type
                    );
                    summary.completed += 1;
                    summary
                        .samples
                        .entry(request.entity_type.clone())
                        .or_default()
                        .extend(page.data.into_iter().take(self.sample_size));
                }
                Err(e) => {
                    warn!("Sample collection failed for {}: {}", request.entity_type, e);
                    summary.failed += 1;
                    summary.errors.push((request.entity_type.clone(), e.to_string()));
                }
            }
        }

        summary
    }
}
