//! CLI command implementations.

pub mod config;
pub mod install;
pub mod launch;
pub mod scan;
pub mod status;
