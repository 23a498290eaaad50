//! PLC Common Library
//!
//! Shared constants and the configuration schema for all PLC runtime
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Numeric limits and defaults
//! - [`config`] - Runtime configuration sections and TOML loading
//! - [`graph`] - Cycle graph declarations (blocks, wiring, outputs)
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod graph;
pub mod prelude;
