//! HTTP downloader.
//!
//! Streams a single file to disk with the blocking reqwest client. The
//! client is built and dropped on the calling thread, which is always a
//! blocking pool thread.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::progress::ProgressCounters;
use crate::config::DEFAULT_DOWNLOAD_TIMEOUT_SECS;
use crate::manager::error::{PipelineError, PipelineResult};
use crate::manager::traits::Downloader;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

const USER_AGENT: &str = concat!("lsolauncher/", env!("CARGO_PKG_VERSION"));

/// Downloads over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    pub(crate) timeout: Duration,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self, url: &str) -> PipelineResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::NetworkFailure {
                url: url.to_string(),
                reason: format!("cannot create HTTP client: {}", e),
            })
    }

    fn stream_download(
        &self,
        url: &str,
        dest: &Path,
        counters: &ProgressCounters,
    ) -> PipelineResult<u64> {
        let client = self.client(url)?;
        let mut response = client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                PipelineError::DownloadTimeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                PipelineError::NetworkFailure {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::NetworkFailure {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }
        if let Some(length) = response.content_length() {
            counters.set_expected(length);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let file = File::create(dest).map_err(|e| PipelineError::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            if counters.stop_requested() {
                return Err(PipelineError::NetworkFailure {
                    url: url.to_string(),
                    reason: "download stopped".to_string(),
                });
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| PipelineError::NetworkFailure {
                    url: url.to_string(),
                    reason: format!("read error: {}", e),
                })?;
            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| PipelineError::io(dest, e))?;
            downloaded += bytes_read as u64;
            counters.add_received(bytes_read as u64);
        }

        writer.flush().map_err(|e| PipelineError::io(dest, e))?;
        debug!(url, bytes = downloaded, "Download complete");
        Ok(downloaded)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path, counters: &ProgressCounters) -> PipelineResult<u64> {
        let result = self.stream_download(url, dest, counters);
        if result.is_err() && dest.exists() {
            let _ = fs::remove_file(dest);
        }
        result
    }
}
