//! Free-space queries through `statvfs`.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::debug;

use super::SpaceInfo;

/// Free (available to unprivileged users) and total bytes of the
/// filesystem holding `path`.
pub(super) fn statvfs_space(path: &Path) -> (SpaceInfo, SpaceInfo) {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return (SpaceInfo::Unknown, SpaceInfo::Unknown);
    };

    // SAFETY: statvfs only writes into the zeroed struct we own.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        debug!(path = %path.display(), "statvfs failed");
        return (SpaceInfo::Unknown, SpaceInfo::Unknown);
    }

    let block = if stat.f_frsize > 0 {
        stat.f_frsize as u64
    } else {
        stat.f_bsize as u64
    };
    (
        SpaceInfo::Known((stat.f_bavail as u64).saturating_mul(block)),
        SpaceInfo::Known((stat.f_blocks as u64).saturating_mul(block)),
    )
}
