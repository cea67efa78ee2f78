use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

use crate::error::{self, DotmanError};

/// All locations dotman reads from and writes to.
///
/// Built once in `main` and handed to every component, so tests can point it
/// at a temporary directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// ~/.dotman
    pub base_dir: PathBuf,
    /// ~/.config
    pub live_config_dir: PathBuf,
    /// ~/.dotman/dotfiles
    pub profile_storage_root: PathBuf,
    /// ~/.dotman/tracked.yaml
    pub tracking_doc_path: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at the current user's home directory
    pub fn from_home() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        Ok(Self::with_home(base_dirs.home_dir()))
    }

    /// Layout rooted at an explicit home directory
    pub fn with_home(home: &Path) -> Self {
        Self::new(home.join(".dotman"), home.join(".config"))
    }

    pub fn new(base_dir: PathBuf, live_config_dir: PathBuf) -> Self {
        let profile_storage_root = base_dir.join("dotfiles");
        let tracking_doc_path = base_dir.join("tracked.yaml");

        Self {
            base_dir,
            live_config_dir,
            profile_storage_root,
            tracking_doc_path,
        }
    }

    /// Resolve the layout from optional overrides (CLI flags or env vars)
    pub fn resolve(home: Option<PathBuf>, config_dir: Option<PathBuf>) -> Result<Self> {
        let mut layout = match home {
            Some(home) => Self::with_home(&home),
            None => Self::from_home()?,
        };
        if let Some(config_dir) = config_dir {
            layout.live_config_dir = config_dir;
        }
        Ok(layout)
    }

    /// Storage directory of a profile
    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.profile_storage_root.join(profile)
    }

    /// Where a tracked directory lives while its profile is active
    pub fn live_path(&self, dir: &str) -> PathBuf {
        self.live_config_dir.join(dir)
    }

    /// Where a tracked directory lives while its profile is stored
    pub fn stored_path(&self, profile: &str, dir: &str) -> PathBuf {
        self.profile_dir(profile).join(dir)
    }

    /// Ensure the storage root exists
    pub fn ensure_dirs(&self) -> error::Result<()> {
        std::fs::create_dir_all(&self.profile_storage_root)
            .map_err(|e| DotmanError::io(&self.profile_storage_root, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_profile_paths() {
        let layout = StorageLayout::with_home(Path::new("/home/u"));
        assert_eq!(layout.profile_dir("work"), PathBuf::from("/home/u/.dotman/dotfiles/work"));
        assert_eq!(
            layout.stored_path("work", "nvim"),
            PathBuf::from("/home/u/.dotman/dotfiles/work/nvim")
        );
        assert_eq!(layout.live_path("nvim"), PathBuf::from("/home/u/.config/nvim"));
        assert!(layout.tracking_doc_path.ends_with(".dotman/tracked.yaml"));
    }

    #[test]
    fn test_resolve_overrides() {
        let layout = StorageLayout::resolve(
            Some(PathBuf::from("/tmp/h")),
            Some(PathBuf::from("/tmp/cfg")),
        )
        .unwrap();
        assert_eq!(layout.base_dir, PathBuf::from("/tmp/h/.dotman"));
        assert_eq!(layout.live_config_dir, PathBuf::from("/tmp/cfg"));
    }

    #[test]
    #[serial]
    fn test_from_home_env() {
        let temp = TempDir::new().unwrap();
        let old = std::env::var_os("HOME");
        unsafe { std::env::set_var("HOME", temp.path()) };

        let layout = StorageLayout::from_home().unwrap();
        assert_eq!(layout.live_config_dir, temp.path().join(".config"));

        match old {
            Some(v) => unsafe { std::env::set_var("HOME", v) },
            None => unsafe { std::env::remove_var("HOME") },
        }
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::with_home(temp.path());
        layout.ensure_dirs().unwrap();
        layout.ensure_dirs().unwrap();
        assert!(layout.profile_storage_root.is_dir());
    }

    #[test]
    fn test_ensure_dirs_blocked_by_file() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::with_home(temp.path());
        std::fs::write(&layout.base_dir, "not a directory").unwrap();

        let err = layout.ensure_dirs().unwrap_err();
        assert!(matches!(err, DotmanError::Io { ref path, .. } if *path == layout.profile_storage_root));
    }
}
