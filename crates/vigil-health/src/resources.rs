//! Resource headroom readings (disk, memory).

use std::path::Path;

/// Disk used percentage for the filesystem containing `path`.
#[cfg(unix)]
pub fn disk_used_percent(path: &Path) -> Option<f64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return None;
    }
    let total = stat.f_blocks as f64 * stat.f_frsize as f64;
    if total <= 0.0 {
        return None;
    }
    let available = stat.f_bavail as f64 * stat.f_frsize as f64;
    Some((1.0 - available / total) * 100.0)
}

#[cfg(not(unix))]
pub fn disk_used_percent(_path: &Path) -> Option<f64> {
    None
}

/// Free memory percentage, from /proc/meminfo on Linux.
pub fn memory_free_percent() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        let mut total_kb = None;
        let mut available_kb = None;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kb = parse_kb(rest);
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kb = parse_kb(rest);
            }
        }
        let (total, available) = (total_kb?, available_kb?);
        if total == 0 {
            return None;
        }
        return Some(available as f64 / total as f64 * 100.0);
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn parse_kb(rest: &str) -> Option<u64> {
    rest.trim().split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn disk_reading_is_a_percentage() {
        let used = disk_used_percent(Path::new("/")).expect("statvfs on /");
        assert!((0.0..=100.0).contains(&used));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn memory_reading_is_a_percentage() {
        let free = memory_free_percent().expect("/proc/meminfo");
        assert!((0.0..=100.0).contains(&free));
    }
}
