pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod persist;
pub mod service;
pub mod walker;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, CatalogCounts};
pub use config::{ConfigCounts, ServerConfig};
pub use error::{Error, Result};
pub use loader::{DataDirectoryLoader, LoaderOptions};
pub use walker::DataDirectoryWalker;
