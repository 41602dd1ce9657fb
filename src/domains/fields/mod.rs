pub mod catalog;
pub mod custom;
pub mod discovery;
pub mod sampling;
pub mod service;
pub mod types;

pub use catalog::standard_fields;
pub use custom::{ApiCustomFieldSource, CustomFieldFetcher, CustomFieldSource};
pub use discovery::{is_iso_date_string, FieldDiscoverer};
pub use sampling::{SampleCollectionSummary, SampleCollector, SampleRequest};
pub use service::FieldDetectionService;
pub use types::{DetectedField, FieldDetectionResult, FieldMapping, FieldSource, FieldType};
