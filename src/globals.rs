use crate::config::ServiceConfig;
use crate::domains::export::service::ExportJobManager;
use crate::domains::fields::custom::{ApiCustomFieldSource, CustomFieldFetcher};
use crate::domains::fields::service::FieldDetectionService;
use crate::domains::selection::repository::KeyValueStore;
use crate::domains::selection::service::SelectionStore;
use crate::errors::{ServiceError, ServiceResult};
use lazy_static::lazy_static;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: tokio::sync::Mutex<()> = tokio::sync::Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref CONFIG: Mutex<Option<ServiceConfig>> = Mutex::new(None);
    static ref CUSTOM_FIELD_FETCHER: Mutex<Option<Arc<CustomFieldFetcher>>> = Mutex::new(None);
    static ref SELECTION_STORE: Mutex<Option<Arc<SelectionStore>>> = Mutex::new(None);
    static ref FIELD_DETECTION_SERVICE: Mutex<Option<Arc<FieldDetectionService>>> = Mutex::new(None);
    static ref EXPORT_JOB_MANAGER: Mutex<Option<Arc<ExportJobManager>>> = Mutex::new(None);
}

fn not_initialized(name: &str) -> ServiceError {
    ServiceError::InvalidState(format!("{} not initialized", name))
}

fn poisoned(name: &str) -> ServiceError {
    ServiceError::InvalidState(format!("{} lock poisoned", name))
}

fn store_global<T>(slot: &Mutex<Option<T>>, name: &str, value: T) -> ServiceResult<()> {
    *slot.lock().map_err(|_| poisoned(name))? = Some(value);
    Ok(())
}

pub fn get_config() -> ServiceResult<ServiceConfig> {
    CONFIG.lock().map_err(|_| poisoned("CONFIG"))?.clone().ok_or_else(|| not_initialized("ServiceConfig"))
}
pub fn get_custom_field_fetcher() -> ServiceResult<Arc<CustomFieldFetcher>> {
    CUSTOM_FIELD_FETCHER.lock().map_err(|_| poisoned("CUSTOM_FIELD_FETCHER"))?.clone().ok_or_else(|| not_initialized("CustomFieldFetcher"))
}
pub fn get_selection_store() -> ServiceResult<Arc<SelectionStore>> {
    SELECTION_STORE.lock().map_err(|_| poisoned("SELECTION_STORE"))?.clone().ok_or_else(|| not_initialized("SelectionStore"))
}
pub fn get_field_detection_service() -> ServiceResult<Arc<FieldDetectionService>> {
    FIELD_DETECTION_SERVICE.lock().map_err(|_| poisoned("FIELD_DETECTION_SERVICE"))?.clone().ok_or_else(|| not_initialized("FieldDetectionService"))
}
pub fn get_export_job_manager() -> ServiceResult<Arc<ExportJobManager>> {
    EXPORT_JOB_MANAGER.lock().map_err(|_| poisoned("EXPORT_JOB_MANAGER"))?.clone().ok_or_else(|| not_initialized("ExportJobManager"))
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Build and register the process-wide services. Later calls are no-ops.
pub async fn initialize(config: ServiceConfig, store: Arc<dyn KeyValueStore>) -> ServiceResult<()> {
    let _guard = INIT_MUTEX.lock().await;
    if INITIALIZED.load(Ordering::Acquire) {
        return Ok(());
    }

    let source = ApiCustomFieldSource::new(&config.api_base_url, config.request_timeout)?;
    let fetcher = Arc::new(CustomFieldFetcher::new(Arc::new(source)));
    let selections = Arc::new(SelectionStore::new(store));
    let detection = Arc::new(FieldDetectionService::from_config(
        &config,
        Arc::clone(&fetcher),
        Arc::clone(&selections),
    ));
    let exports = Arc::new(ExportJobManager::from_config(&config));

    store_global(&CUSTOM_FIELD_FETCHER, "CUSTOM_FIELD_FETCHER", fetcher)?;
    store_global(&SELECTION_STORE, "SELECTION_STORE", selections)?;
    store_global(&FIELD_DETECTION_SERVICE, "FIELD_DETECTION_SERVICE", detection)?;
    store_global(&EXPORT_JOB_MANAGER, "EXPORT_JOB_MANAGER", exports)?;
    store_global(&CONFIG, "CONFIG", config)?;

    INITIALIZED.store(true, Ordering::Release);
    info!("Export services initialized");
    Ok(())
}
