pub mod core;
pub mod export;
pub mod fields;
pub mod selection;
