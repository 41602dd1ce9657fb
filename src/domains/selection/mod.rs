pub mod repository;
pub mod service;
pub mod types;

pub use repository::{InMemoryKeyValueStore, JsonFileKeyValueStore, KeyValueStore};
pub use service::SelectionStore;
pub use types::{ClearScope, SelectionKind};
