mod error;

pub use error::{DomainError, ServiceError, StorageError, ValidationError};

/// Result type for key-value storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
