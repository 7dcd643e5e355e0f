//! # Configuration
//!
//! Client configuration shared by the pipeline crate and the CLI.

pub mod client;
