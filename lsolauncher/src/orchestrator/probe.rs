//! Connectivity check and directory prompt seams.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::{select_ok, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::component::Component;

/// Hosts resolved to decide whether the machine is online.
pub const PROBE_HOSTS: &[&str] = &["google.com:80", "bing.com:80", "yahoo.com:80"];

/// Answers whether downloads can be attempted.
pub trait NetworkProbe: Send + Sync {
    fn is_online(&self) -> BoxFuture<'_, bool>;
}

/// Online when any probe host resolves in time.
#[derive(Debug, Clone)]
pub struct DnsProbe {
    hosts: Vec<String>,
    timeout: Duration,
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self {
            hosts: PROBE_HOSTS.iter().map(|h| h.to_string()).collect(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl DnsProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl NetworkProbe for DnsProbe {
    fn is_online(&self) -> BoxFuture<'_, bool> {
        async move {
            if self.hosts.is_empty() {
                return false;
            }
            let lookups = self.hosts.iter().map(|host| {
                async move {
                    match tokio::net::lookup_host(host.as_str()).await {
                        Ok(mut addrs) => match addrs.next() {
                            Some(_) => Ok(()),
                            None => Err(()),
                        },
                        Err(e) => {
                            debug!(host = %host, error = %e, "Probe lookup failed");
                            Err(())
                        }
                    }
                }
                .boxed()
            });
            matches!(
                tokio::time::timeout(self.timeout, select_ok(lookups)).await,
                Ok(Ok(_))
            )
        }
        .boxed()
    }
}

/// Asks the user where to install.
pub trait DirectoryPrompt: Send + Sync {
    /// A directory for `component`, or `None` when the user cancels.
    /// Blocking.
    fn choose_directory(&self, component: &Component, suggested: Option<&Path>) -> Option<PathBuf>;
}

/// Never answers; every prompt counts as cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl DirectoryPrompt for NoPrompt {
    fn choose_directory(&self, _component: &Component, _suggested: Option<&Path>) -> Option<PathBuf> {
        None
    }
}
