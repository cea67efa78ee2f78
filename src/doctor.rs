//! Diagnostic tool for dotman.
//!
//! This module implements the `dotman doctor` command, which checks for the
//! ways the tracking file and the filesystem drift apart after an interrupted
//! or partially failed move:
//! - Missing storage or config directories.
//! - An unreadable or malformed tracking file.
//! - Tracked directories that are in the wrong place, in both places, or gone.
//! - Storage contents the tracking file doesn't know about.
//!
//! It only reports. Nothing is moved or rewritten.

use anstyle::AnsiColor;
use std::collections::BTreeMap;

use crate::paths::StorageLayout;
use crate::profiles::ProfileManager;
use crate::relocate::list_subdirectories;
use crate::tracking::TrackingIndex;
use crate::ui::Ui;

/// Where a tracked directory currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Live,
    Stored,
    Both,
    Missing,
}

impl Location {
    pub fn detect(layout: &StorageLayout, profile: &str, dir: &str) -> Self {
        let live = layout.live_path(dir).is_dir();
        let stored = layout.stored_path(profile, dir).is_dir();
        match (live, stored) {
            (true, true) => Self::Both,
            (true, false) => Self::Live,
            (false, true) => Self::Stored,
            (false, false) => Self::Missing,
        }
    }
}

/// Directory names tracked by more than one config
pub fn shared_directories(index: &TrackingIndex) -> BTreeMap<String, Vec<String>> {
    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for profile in index.profile_names() {
        for dir in index.tracked_dirs(profile).unwrap_or_default() {
            owners.entry(dir).or_default().push(profile.to_string());
        }
    }
    owners.retain(|_, profiles| profiles.len() > 1);
    owners
}

/// Run the doctor diagnostics
pub fn run_doctor(pm: &ProfileManager, ui: &Ui) {
    let layout = pm.layout();

    ui.section("dotman Doctor");
    ui.newline();

    // 1. Check directories
    check_step(ui, "Directories", || {
        let mut ok = true;
        for (label, path, required) in [
            ("Config directory", &layout.live_config_dir, true),
            ("Storage directory", &layout.profile_storage_root, false),
        ] {
            if path.is_dir() {
                ui.println(format!("  {} {} exists: {}", ui.icon_ok(), label, path.display()));
            } else if required {
                ui.println(format!("  {} {} missing: {}", ui.icon_err(), label, path.display()));
                ok = false;
            } else {
                // Created on first use
                ui.println(format!("  {} {} missing: {}", ui.icon_warn(), label, path.display()));
            }
        }
        ok
    });

    // 2. Check tracking file
    let index = match pm.index() {
        Ok(index) => Some(index),
        Err(e) => {
            check_step(ui, "Tracking File", || {
                ui.println(format!("  {} Tracking file unreadable: {}", ui.icon_err(), e));
                false
            });
            None
        }
    };
    let Some(index) = index else {
        return;
    };

    check_step(ui, "Tracking File", || {
        if layout.tracking_doc_path.exists() {
            ui.println(format!("  {} Tracking file readable", ui.icon_ok()));
        } else {
            ui.println(format!("  {} Tracking file missing (fresh install?)", ui.icon_warn()));
        }

        // A dangling active name is dropped (and logged) on load
        match index.active_profile() {
            Some(active) => {
                ui.println(format!("  {} Active config: {}", ui.icon_info(), active));
            }
            None => {
                ui.println(format!("  {} No active config set", ui.icon_info()));
            }
        }
        true
    });

    // 3. Check tracked directories
    check_step(ui, "Configs", || {
        let names: Vec<&str> = index.profile_names().collect();
        if names.is_empty() {
            ui.println(format!("  {} No configs found", ui.icon_warn()));
            return true;
        }

        let mut all_valid = true;
        for name in names {
            let active = index.active_profile() == Some(name);
            if layout.profile_dir(name).is_dir() {
                ui.println(format!("    {} {}", ui.icon_ok(), name));
            } else {
                ui.println(format!("    {} {} (storage directory missing)", ui.icon_warn(), name));
            }

            let tracked = index.tracked_dirs(name).unwrap_or_default();
            for dir in &tracked {
                match (Location::detect(layout, name, dir), active) {
                    (Location::Live, true) | (Location::Stored, false) => {}
                    (Location::Live, false) => ui.println(format!(
                        "      {} {} is in the config directory but '{}' is not active",
                        ui.icon_warn(),
                        dir,
                        name
                    )),
                    (Location::Stored, true) => ui.println(format!(
                        "      {} {} is still in storage although '{}' is active",
                        ui.icon_warn(),
                        dir,
                        name
                    )),
                    (Location::Both, _) => {
                        ui.println(format!(
                            "      {} {} exists both live and in storage",
                            ui.icon_err(),
                            dir
                        ));
                        all_valid = false;
                    }
                    (Location::Missing, _) => {
                        ui.println(format!("      {} {} is missing", ui.icon_err(), dir));
                        all_valid = false;
                    }
                }
            }

            if let Ok(stored) = list_subdirectories(&layout.profile_dir(name)) {
                for dir in stored.iter().filter(|d| !tracked.contains(*d)) {
                    ui.println(format!(
                        "      {} {} is in storage but not tracked",
                        ui.icon_warn(),
                        dir
                    ));
                }
            }
        }
        all_valid
    });

    // 4. Storage and ownership
    check_step(ui, "Storage", || {
        let mut ok = true;
        if let Ok(stored) = list_subdirectories(&layout.profile_storage_root) {
            for name in stored.iter().filter(|n| !index.has_profile(n)) {
                ui.println(format!(
                    "  {} {} is in storage but not in the tracking file",
                    ui.icon_warn(),
                    name
                ));
            }
        }
        for (dir, owners) in shared_directories(&index) {
            ui.println(format!(
                "  {} {} is tracked by several configs: {}",
                ui.icon_err(),
                dir,
                owners.join(", ")
            ));
            ok = false;
        }
        ok
    });
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}
