//! # APO Common Library
//!
//! Shared code for the APO scoring service:
//! - Error type used across crates
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Logging configuration

pub mod config;
pub mod error;

pub use config::{AppConfig, FeatureFlags};
pub use error::{Error, Result};
