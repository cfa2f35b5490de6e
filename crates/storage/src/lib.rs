#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;
pub mod sqlite;

pub use catalog::{Catalog, CatalogError};
pub use repository::{CompletionId, CompletionRow, Storage, StorageError};
