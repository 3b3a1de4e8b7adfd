//! Seams of the installer pipeline.
//!
//! Each external effect sits behind a trait so the pipeline can be driven
//! with fakes in tests. All methods are blocking and are called from the
//! blocking thread pool.

use std::path::Path;

use super::download::ProgressCounters;
use super::error::PipelineResult;

/// Fetches a payload to a local file.
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, adding received bytes to `counters` and
    /// stopping early when a stop is requested. Returns the byte count.
    ///
    /// A partially written `dest` is removed on failure.
    fn download(&self, url: &str, dest: &Path, counters: &ProgressCounters) -> PipelineResult<u64>;
}

/// Unpacks an archive.
pub trait ArchiveExtractor: Send + Sync {
    /// Check that `archive` looks like an archive this extractor reads.
    fn verify(&self, archive: &Path) -> PipelineResult<()> {
        let _ = archive;
        Ok(())
    }

    /// Extract `archive` into `dest`. Returns the number of files written.
    fn extract(&self, archive: &Path, dest: &Path) -> PipelineResult<usize>;
}
