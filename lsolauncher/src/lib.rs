//! LegacySO launcher - installs, finds and starts the LegacySO game client
//! and the components it depends on.
//!
//! ```text
//! drives ──> discovery ──> orchestrator ──> manager (pipeline)
//!                 ▲              │
//!   component ────┘              └──> launch
//! ```

pub mod component;
pub mod config;
pub mod discovery;
pub mod drives;
pub mod launch;
pub mod logging;
pub mod manager;
pub mod orchestrator;

/// Launcher version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
