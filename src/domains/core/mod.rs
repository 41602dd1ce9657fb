pub mod cache;

pub use cache::{scoped_key, MemoryCache};
