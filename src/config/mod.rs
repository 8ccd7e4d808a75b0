//! Pipeline Configuration Module
//!
//! Serial-link, buffer, analysis and session settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `PARKIMOTION_CONFIG` environment variable (path to TOML file)
//! 2. `parkimotion.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded [`PipelineConfig`] is owned by the caller and handed to
//! [`Pipeline::new`](crate::pipeline::Pipeline::new); there is no global copy.

mod pipeline_config;
pub mod defaults;
pub mod validation;

pub use pipeline_config::*;
