//! Test utilities shared across test modules

use std::fs;

use crate::paths::StorageLayout;
use tempfile::TempDir;

/// Create a StorageLayout for testing using a temporary directory
///
/// Mimics the real ~/.dotman/ and ~/.config/ layout inside the temp directory.
pub fn setup_test_layout(temp_dir: &TempDir) -> StorageLayout {
    let layout = StorageLayout::with_home(temp_dir.path());
    fs::create_dir_all(&layout.live_config_dir).unwrap();
    layout
}

/// Create ~/.config/<name> with a file inside
pub fn make_live_dir(layout: &StorageLayout, name: &str) {
    let dir = layout.live_path(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("init.lua"), format!("-- {name}")).unwrap();
}
