use std::sync::Arc;

// Public modules
pub mod config;
pub mod domains;
pub mod errors;
pub mod globals;

use config::ServiceConfig;
use domains::selection::repository::KeyValueStore;
use errors::ServiceResult;

/// Initialize logging and the process-wide services.
/// Must be called before any `globals::get_*` accessor.
pub async fn initialize(config: ServiceConfig, store: Arc<dyn KeyValueStore>) -> ServiceResult<()> {
    // A host application may already have installed a logger
    let _ = env_logger::try_init();
    globals::initialize(config, store).await
}

/// `initialize` with configuration read from the environment (and `.env`).
pub async fn initialize_from_env(store: Arc<dyn KeyValueStore>) -> ServiceResult<()> {
    initialize(ServiceConfig::from_env()?, store).await
}
