// groupcache-emf - CloudWatch EMF exporter for groupcache statistics
// Copyright (C) 2025 groupcache-emf Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//! Configuration for the groupcache EMF exporter
//!
//! Loads exporter settings from TOML, YAML or JSON files, applies
//! `GROUPCACHE_EMF_*` environment variable overrides and validates the result.
//!
//! # Example
//!
//! ```no_run
//! use groupcache_emf_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_overrides(Some("exporter.toml")).await?;
//!
//!     println!("Exporting every {}s", config.exporter.export_interval_secs);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, ENV_PREFIX};
pub use schema::*;
pub use validation::{Validator, RESERVED_DIMENSION_KEYS};
