//! Archive extraction for component installation.
//!
//! Component payloads are ZIP archives. Extraction refuses entries that
//! would escape the destination directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use super::error::{PipelineError, PipelineResult};
use super::traits::ArchiveExtractor;

/// Local file header signature at the start of every ZIP archive.
pub const ZIP_SIGNATURE: [u8; 4] = *b"PK\x03\x04";

/// Extracts ZIP archives in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn verify(&self, archive: &Path) -> PipelineResult<()> {
        check_zip_signature(archive)
    }

    fn extract(&self, archive: &Path, dest: &Path) -> PipelineResult<usize> {
        check_zip_signature(archive)?;

        let file = File::open(archive).map_err(|e| PipelineError::io(archive, e))?;
        let mut zip =
            ZipArchive::new(file).map_err(|e| PipelineError::corrupt(archive, e.to_string()))?;
        fs::create_dir_all(dest).map_err(|e| PipelineError::io(dest, e))?;

        let mut count = 0;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| PipelineError::corrupt(archive, e.to_string()))?;

            let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                warn!(entry = entry.name(), "Skipping archive entry outside destination");
                continue;
            };
            let out_path = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| PipelineError::io(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
            let mut out = File::create(&out_path).map_err(|e| PipelineError::io(&out_path, e))?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| PipelineError::corrupt(archive, format!("{}: {}", entry.name(), e)))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode().filter(|m| m & 0o777 != 0) {
                    let mode = (mode & 0o777) | 0o600;
                    let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode));
                }
            }

            count += 1;
        }

        debug!(archive = %archive.display(), files = count, "Archive extracted");
        Ok(count)
    }
}

/// Fail with `ArchiveCorrupt` unless `path` is a non-empty file starting
/// with the ZIP signature.
pub fn check_zip_signature(path: &Path) -> PipelineResult<()> {
    let mut file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut header = [0u8; 4];
    let mut read = 0;
    while read < header.len() {
        match file.read(&mut header[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PipelineError::io(path, e)),
        }
    }

    match read {
        0 => Err(PipelineError::corrupt(path, "downloaded file is empty")),
        4 if header == ZIP_SIGNATURE => Ok(()),
        _ => Err(PipelineError::corrupt(path, "not a ZIP archive")),
    }
}
