use crate::domains::export::pagination::{cap_page_limit, Page, PageSource};
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Page source backed by the vendor's record listing endpoint:
/// `GET <base>/<entityType>?offset=&limit=[&tenantSlug=]`
pub struct HttpPageSource {
    client: Client,
    base_url: String,
    entity_type: String,
    tenant_slug: Option<String>,
}

impl HttpPageSource {
    pub fn new(
        base_url: &str,
        entity_type: &str,
        tenant_slug: Option<&str>,
        timeout: Duration,
    ) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            entity_type: entity_type.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
        })
    }

    fn page_url(&self, offset: usize, limit: usize) -> String {
        let mut url = format!(
            "{}/{}?offset={}&limit={}",
            self.base_url,
            urlencoding::encode(&self.entity_type),
            offset,
            cap_page_limit(limit)
        );
        if let Some(tenant) = &self.tenant_slug {
            url.push_str("&tenantSlug=");
            url.push_str(&urlencoding::encode(tenant));
        }
        url
    }
}

/// Accepts either `{data: [...], total?}` or a bare array.
fn parse_page(body: Value) -> ServiceResult<Page<Value>> {
    match body {
        Value::Array(data) => Ok(Page::new(data, None)),
        Value::Object(mut map) => {
            let data = match map.remove("data") {
                Some(Value::Array(data)) => data,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(ServiceError::ExternalService(format!(
                        "Unexpected page data shape: {}",
                        other
                    )))
                }
            };
            let total = map
                .get("total")
                .and_then(Value::as_u64)
                .map(|t| t as usize);
            Ok(Page::new(data, total))
        }
        other => Err(ServiceError::ExternalService(format!(
            "Unexpected page response: {}",
            other
        ))),
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> ServiceResult<Page<Value>> {
        let url = self.page_url(offset, limit);
        debug!("Fetching export page from {}", url);

        let response = self.client.get(&url).send().await?;

        if response.status().is_success() {
            parse_page(response.json::<Value>().await?)
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
