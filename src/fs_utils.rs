//! Filesystem helpers for reporting.

use std::fs;
use std::path::Path;

/// File count and total size of a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: u64,
    pub bytes: u64,
}

/// Walk `path` and sum regular file sizes. Symbolic links are not followed.
pub fn dir_stats(path: &Path) -> std::io::Result<DirStats> {
    let mut stats = DirStats::default();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            stats.files += 1;
            stats.bytes += entry.metadata()?.len();
        } else if file_type.is_dir() {
            let nested = dir_stats(&entry.path())?;
            stats.files += nested.files;
            stats.bytes += nested.bytes;
        }
    }
    Ok(stats)
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_stats_nested() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("lua/plugins")).unwrap();
        fs::write(temp.path().join("init.lua"), "12345").unwrap();
        fs::write(temp.path().join("lua/plugins/a.lua"), "123").unwrap();

        let stats = dir_stats(temp.path()).unwrap();
        assert_eq!(stats, DirStats { files: 2, bytes: 8 });
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
