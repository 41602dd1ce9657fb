pub mod pagination;
pub mod remote;
pub mod service;
pub mod types;
pub mod writer;

pub use pagination::{fetch_all, fetch_all_from, FetchAllOptions, FetchAllResult, Page, PageSource, VecPageSource};
pub use remote::HttpPageSource;
pub use service::ExportJobManager;
pub use types::{ExportError, ExportFormat, ExportProgress, ExportRequest, ExportSource, ExportStatus};
pub use writer::ExportWriter;
