//! Shared types, error model, and configuration for SchemaScribe.
//!
//! Every other SchemaScribe crate depends on this one. It provides:
//! - [`SchemaScribeError`] and the crate-wide [`Result`] alias
//! - Catalog row types and desired-state merge inputs ([`TypeRow`], [`NewType`], ...)
//! - Role-tag vocabularies and the derived-type naming scheme
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, SummarizeConfig, UpstreamConfig, catalog_db_path, config_dir,
    config_file_path, init_config, load_config, load_config_from, summarize_api_key,
    validate_api_key, validate_config,
};
pub use error::{Result, SchemaScribeError};
pub use types::{
    ArgumentRow, DataObjectQueryRow, DataObjectRow, DataSourceRow, FieldRow, ModuleRow,
    NewArgument, NewDataObject, NewDataObjectQuery, NewDataSource, NewField, NewModule, NewType,
    TypeRow,
};
