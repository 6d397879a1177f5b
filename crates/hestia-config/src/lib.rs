//! Typed configuration for Hestia servers.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use hestia_config::{ConfigLoader, HestiaConfig};
//!
//! # fn main() -> Result<(), hestia_config::ConfigError> {
//! let config: HestiaConfig = ConfigLoader::new()
//!     .with_optional_file("hestia.toml")?
//!     .with_env_prefix("HESTIA")
//!     .load()?;
//!
//! println!("listening on {}", config.server.bind_address());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! address = "0.0.0.0"
//! port = 8000
//!
//! [server.liveness]
//! path = "/healthz"
//!
//! [server.version]
//! value = "1.4.2"
//!
//! [server.timeouts]
//! idle_secs = 30
//! read_ms = 3000
//! read_header_ms = 3000
//! write_ms = 10000
//!
//! [server.cors]
//! allow_origins = ["https://app.example.com"]
//! allow_methods = ["GET", "POST"]
//! allow_credentials = true
//! max_age_secs = 1800
//!
//! [server.disable]
//! signal_handling = false
//!
//! [server.lifecycle]
//! unclassified_errors = "continue"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `HESTIA__SERVER__PORT=9000`
//! - `HESTIA__SERVER__CORS__ALLOW_ORIGINS=https://a.com,https://b.com`
//! - `HESTIA__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
