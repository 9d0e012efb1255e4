//! Configuration utilities re-exported at the crate root.
//!
//! This exposes [`DatabaseConfig`] and [`DocumentsConfig`] so applications can
//! load settings from `config/config.toml` or `DOCDB__*` environment variables
//! using `DatabaseConfig::load()` / `DocumentsConfig::load()`.

pub use crate::pool::config::*;
