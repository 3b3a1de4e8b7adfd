//! Drive and mount enumeration.
//!
//! Drives are recomputed on every call; removable media come and go between
//! scans. A drive that cannot be read is left out rather than failing the
//! whole listing, and free space that cannot be measured is reported as
//! [`SpaceInfo::Unknown`] (zero means a full disk).

mod mounts;
#[cfg(unix)]
mod space;

pub use mounts::{parse_mounts, MountEntry};

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

/// A byte count that may be unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceInfo {
    Known(u64),
    Unknown,
}

impl SpaceInfo {
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(*bytes),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for SpaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(bytes) => f.write_str(&format_size(*bytes)),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A mounted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drive {
    /// Drive letter (`C:`) or mount name.
    pub id: String,
    /// Root directory of the volume.
    pub root: PathBuf,
    pub label: Option<String>,
    pub free: SpaceInfo,
    pub total: SpaceInfo,
}

impl Drive {
    /// A drive with unknown space figures.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            label: None,
            free: SpaceInfo::Unknown,
            total: SpaceInfo::Unknown,
        }
    }

    pub fn with_space(mut self, free: SpaceInfo, total: SpaceInfo) -> Self {
        self.free = free;
        self.total = total;
        self
    }
}

/// Something that can list drives. Discovery and drive selection take this
/// instead of calling [`list_drives`] directly.
pub trait DriveSource: Send + Sync {
    fn list_drives(&self) -> Vec<Drive>;
}

/// The host's real drives.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDrives;

impl DriveSource for SystemDrives {
    fn list_drives(&self) -> Vec<Drive> {
        list_drives()
    }
}

/// A fixed drive list.
#[derive(Debug, Clone, Default)]
pub struct StaticDrives(pub Vec<Drive>);

impl DriveSource for StaticDrives {
    fn list_drives(&self) -> Vec<Drive> {
        self.0.clone()
    }
}

/// Enumerate the host's mounted drives in platform order.
pub fn list_drives() -> Vec<Drive> {
    let drives = platform_drives();
    debug!(count = drives.len(), "Enumerated drives");
    drives
}

/// The drive with the most known free space, if any has at least
/// `min_free` bytes. Drives with unknown space never qualify.
pub fn best_drive(drives: &[Drive], min_free: u64) -> Option<&Drive> {
    drives
        .iter()
        .filter_map(|d| d.free.bytes().map(|free| (d, free)))
        .filter(|(_, free)| *free >= min_free)
        .max_by_key(|(_, free)| *free)
        .map(|(d, _)| d)
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match bytes {
        b if b >= TB => format!("{:.1} TB", b as f64 / TB as f64),
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}

#[cfg(windows)]
fn platform_drives() -> Vec<Drive> {
    use std::path::Path;
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();
    let mut drives = Vec::new();

    for letter in b'A'..=b'Z' {
        let id = format!("{}:", letter as char);
        let root = PathBuf::from(format!("{}\\", id));
        if std::fs::read_dir(&root).is_err() {
            continue;
        }
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new(&root));
        let mut drive = Drive::new(id, root);
        if let Some(disk) = disk {
            drive.free = SpaceInfo::Known(disk.available_space());
            drive.total = SpaceInfo::Known(disk.total_space());
            let label = disk.name().to_string_lossy().to_string();
            if !label.is_empty() {
                drive.label = Some(label);
            }
        }
        drives.push(drive);
    }

    drives
}

#[cfg(target_os = "macos")]
fn platform_drives() -> Vec<Drive> {
    use std::fs;

    let mut drives = Vec::new();
    drives.push(measured(Drive::new("/", "/")));

    if let Ok(entries) = fs::read_dir("/Volumes") {
        let mut volumes: Vec<_> = entries
            .filter_map(|e| e.ok())
            // The boot volume shows up as a symlink back to "/".
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
            .collect();
        volumes.sort();
        for (name, path) in volumes {
            if fs::read_dir(&path).is_err() {
                debug!(volume = %name, "Skipping unreadable volume");
                continue;
            }
            let mut drive = Drive::new(name.clone(), path);
            drive.label = Some(name);
            drives.push(measured(drive));
        }
    }

    drives
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_drives() -> Vec<Drive> {
    use std::fs;

    let mounts = match fs::read_to_string("/proc/mounts") {
        Ok(content) => parse_mounts(&content),
        Err(e) => {
            debug!(error = %e, "Mount table unavailable, using /");
            vec![MountEntry::root()]
        }
    };

    mounts
        .into_iter()
        .filter(|m| m.is_user_volume())
        .filter_map(|m| {
            if fs::read_dir(&m.mount_point).is_err() {
                debug!(mount = %m.mount_point.display(), "Skipping unreadable mount");
                return None;
            }
            let id = m.name();
            let mut drive = Drive::new(id, m.mount_point);
            drive.label = Some(m.device);
            Some(measured(drive))
        })
        .collect()
}

#[cfg(unix)]
fn measured(mut drive: Drive) -> Drive {
    let (free, total) = space::statvfs_space(&drive.root);
    drive.free = free;
    drive.total = total;
    drive
}
