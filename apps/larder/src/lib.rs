//! # Larder Library
//!
//! CLI, configuration and file loaders for the Larder binary, exposed as a
//! library so integration tests can drive them.

pub mod cli;
pub mod config;
pub mod loader;
