//! Component installer pipeline.
//!
//! Gets one component onto disk: download, extract, move into the install
//! root, open up permissions.
//!
//! # Architecture
//!
//! ```text
//! Pipeline::run
//!     │
//!     ├── Downloader (trait)          HttpDownloader
//!     │       └── ProgressSampler     (tokio interval over ProgressCounters)
//!     ├── ArchiveExtractor (trait)    ZipExtractor
//!     ├── PrivilegedCopy (trait)      DirectCopy / ElevatedCopy
//!     └── ScratchDir                  <temp_dir>/<task id>, always removed
//! ```

mod config;
pub mod download;
mod error;
mod extractor;
mod permissions;
mod pipeline;
mod privileged;
mod traits;

pub use config::{ManagerConfig, DEFAULT_PROGRESS_INTERVAL};
pub use download::{HttpDownloader, ProgressCounters, ProgressSampler};
pub use error::{ErrorClass, InstallError, InstallResult, PipelineError, PipelineResult};
pub use extractor::{check_zip_signature, ZipExtractor, ZIP_SIGNATURE};
pub use permissions::{icacls_args, make_accessible};
pub use pipeline::{
    InstallRequest, Pipeline, PipelineOutcome, PipelineProgress, ProgressCallback, ScratchDir,
    Stage, StageTracker,
};
pub use privileged::{
    copy_dir_recursive, copy_script, grant_script, platform_copier, CopyMode, DirectCopy,
    ElevatedCopy, PrivilegedCopy,
};
pub use traits::{ArchiveExtractor, Downloader};
