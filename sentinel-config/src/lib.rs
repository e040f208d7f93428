//! Config-file loading for the sentinel monitoring engine: parses a TOML
//! object definition file into a validated `sentinel_core::model::ObjectGraph`
//! plus the resolved `EngineConfig` (spec.md §3, §9 "a fresh config load
//! rebuilds the graph from scratch on every restart").

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, Result};
pub use loader::{load_file, load_str, LoadedConfig};
