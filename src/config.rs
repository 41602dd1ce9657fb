use crate::errors::{ServiceError, ServiceResult};
use std::str::FromStr;
use std::time::Duration;

/// Hard platform ceiling: no single page fetch may request more records than this.
pub const MAX_PAGE_SIZE: usize = 2000;

/// Runtime configuration for detection and export.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the vendor API used by the HTTP collaborators
    pub api_base_url: String,
    /// Row count at or above which exports are streamed page by page
    pub streaming_threshold: usize,
    /// Page size for streaming exports, never above `MAX_PAGE_SIZE`
    pub page_size: usize,
    /// Maximum number of records inspected by field discovery
    pub sample_size: usize,
    /// Age after which a detection result is considered stale
    pub detection_stale_after: Duration,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            streaming_threshold: 5000,
            page_size: MAX_PAGE_SIZE,
            sample_size: 100,
            detection_stale_after: Duration::from_secs(20 * 60),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl ServiceConfig {
    /// Build a configuration from the process environment, loading `.env` first.
    pub fn from_env() -> ServiceResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("EXPORT_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        let streaming_threshold = parse_var(&lookup, "EXPORT_STREAMING_THRESHOLD")?
            .unwrap_or(defaults.streaming_threshold);
        let page_size = parse_var::<usize, _>(&lookup, "EXPORT_PAGE_SIZE")?
            .unwrap_or(defaults.page_size);
        let sample_size = parse_var(&lookup, "EXPORT_SAMPLE_SIZE")?
            .unwrap_or(defaults.sample_size);
        let stale_minutes = parse_var::<u64, _>(&lookup, "EXPORT_DETECTION_STALE_MINUTES")?;
        let timeout_secs = parse_var::<u64, _>(&lookup, "EXPORT_REQUEST_TIMEOUT_SECS")?;

        if page_size == 0 {
            return Err(ServiceError::Configuration(
                "EXPORT_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }
        if page_size > MAX_PAGE_SIZE {
            log::warn!(
                "EXPORT_PAGE_SIZE {} exceeds platform limit, clamping to {}",
                page_size,
                MAX_PAGE_SIZE
            );
        }

        Ok(Self {
            api_base_url,
            streaming_threshold,
            page_size: page_size.min(MAX_PAGE_SIZE),
            sample_size,
            detection_stale_after: stale_minutes
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.detection_stale_after),
            request_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> ServiceResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ServiceError::Configuration(format!("{} is invalid ({}): {}", name, raw, e))),
    }
}
