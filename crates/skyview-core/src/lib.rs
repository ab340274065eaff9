//! # skyview-core
//!
//! Core crate for Skyview. Contains the configuration schemas consumed by
//! the host and the plugin engine, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Skyview crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
