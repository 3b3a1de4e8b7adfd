//! `/proc/mounts` parsing.

use std::path::{Path, PathBuf};

/// Prefixes under which removable and secondary volumes are mounted.
const USER_MOUNT_PREFIXES: &[&str] = &["/mnt/", "/media/", "/run/media/"];

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    /// The root filesystem with unknown device and type.
    pub fn root() -> Self {
        Self {
            device: "rootfs".to_string(),
            mount_point: PathBuf::from("/"),
            fs_type: String::new(),
        }
    }

    /// Whether the mount is the root filesystem or a user-visible volume.
    pub fn is_user_volume(&self) -> bool {
        let mount = self.mount_point.to_string_lossy();
        mount == "/" || USER_MOUNT_PREFIXES.iter().any(|p| mount.starts_with(p))
    }

    /// Short name used as the drive id.
    pub fn name(&self) -> String {
        if self.mount_point == Path::new("/") {
            return "/".to_string();
        }
        self.mount_point
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.mount_point.display().to_string())
    }
}

/// Parse mount table content. Malformed lines are skipped; a mount point
/// listed twice is kept once, at its first position.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    let mut entries: Vec<MountEntry> = Vec::new();

    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount), Some(fs_type)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        let mount_point = PathBuf::from(unescape(mount));
        if entries.iter().any(|e| e.mount_point == mount_point) {
            continue;
        }
        entries.push(MountEntry {
            device: unescape(device),
            mount_point,
            fs_type: fs_type.to_string(),
        });
    }

    entries
}

/// Decode the octal escapes (`\040` for space) used in the mount table.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/sdb1 /media/user/Game\\040Drive vfat rw,nosuid 0 0
/dev/sdc1 /mnt/storage ntfs3 rw 0 0
tmpfs /run/user/1000 tmpfs rw 0 0
garbage
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
";

    #[test]
    fn test_parse_and_filter() {
        let volumes: Vec<_> = parse_mounts(SAMPLE)
            .into_iter()
            .filter(|m| m.is_user_volume())
            .collect();

        let points: Vec<_> = volumes.iter().map(|m| m.mount_point.clone()).collect();
        assert_eq!(
            points,
            vec![
                PathBuf::from("/"),
                PathBuf::from("/media/user/Game Drive"),
                PathBuf::from("/mnt/storage"),
            ]
        );
        assert_eq!(volumes[1].name(), "Game Drive");
        assert_eq!(volumes[0].name(), "/");
        assert_eq!(volumes[2].fs_type, "ntfs3");
    }

    #[test]
    fn test_unescape_leaves_plain_backslash() {
        assert_eq!(unescape("a\\b"), "a\\b");
        assert_eq!(unescape("x\\011y"), "x\ty");
        assert_eq!(unescape("end\\04"), "end\\04");
    }
}
