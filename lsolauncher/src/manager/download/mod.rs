//! Downloading component payloads.
//!
//! ```text
//! Pipeline ──spawn_blocking──> Downloader::download ──> ProgressCounters
//!    │                                                        ▲
//!    └──────────── ProgressSampler (tokio interval) ──────────┘
//! ```

mod http;
mod progress;

pub use http::HttpDownloader;
pub use progress::{ProgressCounters, ProgressSampler, SampleCallback};
