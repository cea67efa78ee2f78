//! Core profile (config) management.
//!
//! This module is the orchestration layer of dotman:
//! - Creating configs
//! - Moving directories from `~/.config` into a config
//! - Activating a config (loading its directories into `~/.config`)
//! - Deactivating a config (moving its tracked directories back to storage)
//! - Listing configs and tracked directories
//!
//! Every operation reloads the tracking index and saves it after each change.
//! Nothing here talks to the terminal; the one interactive decision (switching
//! away from an active config) is delegated to a caller-supplied closure.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Component as PathComponent;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{DotmanError, Result};
use crate::paths::StorageLayout;
use crate::relocate::{PlannedMove, RelocationOutcome, list_subdirectories, move_many};
use crate::tracking::{LockedIndex, TrackingIndex};

/// Validate a config name.
///
/// Only allows alphanumeric characters, underscores, and hyphens.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| DotmanError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("config name cannot be empty"));
    }
    if name.chars().count() > 64 {
        return Err(invalid("config name cannot be longer than 64 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            "only alphanumeric characters, hyphens (-), and underscores (_) are allowed",
        ));
    }
    Ok(())
}

/// Validate a directory name: exactly one normal path component.
pub fn validate_dir_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(PathComponent::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(DotmanError::InvalidName {
            name: name.to_string(),
            reason: "expected a directory name inside the config directory, not a path".into(),
        }),
    }
}

/// One row of `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    /// Number of tracked directories
    pub tracked: usize,
    /// Present in the tracking index
    pub indexed: bool,
    /// Storage directory exists
    pub stored: bool,
    pub active: bool,
}

/// A subdirectory of the live config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveDirectory {
    pub name: String,
    pub tracked_by: Option<String>,
}

/// Dry run of an activation, shown to the caller before anything moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPlan {
    pub target: String,
    /// Active config that would be deactivated first
    pub current: Option<String>,
    /// Directories that would go back to the current config's storage
    pub returning: Vec<String>,
    /// Directories that would be loaded from the target's storage
    pub loading: Vec<String>,
}

impl SwitchPlan {
    /// True if another config is active and has to be put away first
    pub fn requires_deactivation(&self) -> bool {
        self.current
            .as_deref()
            .is_some_and(|current| current != self.target)
    }
}

/// Result of `activate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Activation {
    Activated {
        profile: String,
        /// Config that was deactivated on the way, with its moves
        deactivated: Option<String>,
        returned: Vec<RelocationOutcome>,
        loaded: Vec<RelocationOutcome>,
    },
    /// The confirmation gate said no; nothing changed
    Declined,
}

/// Manages configs under a storage layout
#[derive(Debug, Clone)]
pub struct ProfileManager {
    layout: StorageLayout,
}

impl ProfileManager {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Fresh read of the tracking index
    pub fn index(&self) -> Result<TrackingIndex> {
        TrackingIndex::load(&self.layout.tracking_doc_path)
    }

    fn lock(&self) -> Result<LockedIndex> {
        self.layout.ensure_dirs()?;
        LockedIndex::lock(&self.layout.tracking_doc_path)
    }

    fn ensure_profile_dir(&self, profile: &str) -> Result<()> {
        let dir = self.layout.profile_dir(profile);
        fs::create_dir_all(&dir).map_err(|e| DotmanError::io(&dir, e))
    }

    /// Create an empty config and its storage directory
    pub fn create_profile(&self, name: &str) -> Result<()> {
        validate_profile_name(name)?;
        let mut locked = self.lock()?;

        if locked.index().has_profile(name) || self.layout.profile_dir(name).exists() {
            return Err(DotmanError::AlreadyExists(name.to_string()));
        }

        self.ensure_profile_dir(name)?;
        locked.update(|index| Ok(index.create_profile(name)))?;

        info!(profile = name, "created config");
        Ok(())
    }

    /// Move `dirs` from the live config directory into `profile` and track them.
    ///
    /// The whole call is rejected before any move if the config is unknown, a
    /// name is not a single component, or a name is tracked by another config.
    pub fn add_directories<S: AsRef<str>>(
        &self,
        profile: &str,
        dirs: &[S],
    ) -> Result<Vec<RelocationOutcome>> {
        let mut locked = self.lock()?;
        let index = locked.index();

        if !index.has_profile(profile) {
            return Err(DotmanError::ProfileNotFound(profile.to_string()));
        }
        for dir in dirs {
            let dir = dir.as_ref();
            validate_dir_name(dir)?;
            if let Some(owner) = index.tracked_by(dir)
                && owner != profile
            {
                return Err(DotmanError::AlreadyTracked {
                    dir: dir.to_string(),
                    profile: owner.to_string(),
                });
            }
        }

        self.ensure_profile_dir(profile)?;

        let mut outcomes = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let dir = dir.as_ref();
            let planned = PlannedMove::new(
                dir,
                self.layout.live_path(dir),
                self.layout.stored_path(profile, dir),
            );
            // One move at a time so the index is saved right after each success
            let outcome = move_many([planned]).remove(0);
            if outcome.is_moved() {
                locked.update(|index| index.track_directory(profile, dir))?;
                info!(profile, dir, "tracked directory");
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// What `activate(target)` would move, without moving anything
    pub fn plan_activation(&self, target: &str) -> Result<SwitchPlan> {
        let index = self.index()?;
        self.plan_with(&index, target)
    }

    fn plan_with(&self, index: &TrackingIndex, target: &str) -> Result<SwitchPlan> {
        if !index.has_profile(target) {
            return Err(DotmanError::ProfileNotFound(target.to_string()));
        }

        let current = index.active_profile().map(str::to_string);
        let returning = match current.as_deref() {
            Some(current) if current != target => index
                .tracked_dirs(current)
                .unwrap_or_default()
                .into_iter()
                .filter(|dir| validate_dir_name(dir).is_ok() && self.layout.live_path(dir).is_dir())
                .collect(),
            _ => Vec::new(),
        };
        let loading = list_subdirectories(&self.layout.profile_dir(target))?;

        Ok(SwitchPlan {
            target: target.to_string(),
            current,
            returning,
            loading,
        })
    }

    /// Load `profile` into the live config directory.
    ///
    /// If a different config is active, `confirm` is asked first; on `false`
    /// nothing changes and `Activation::Declined` is returned. Otherwise the
    /// active config is deactivated, then every directory in the target's
    /// storage is moved live and the target becomes active, even if some
    /// moves failed.
    pub fn activate<F>(&self, profile: &str, confirm: F) -> Result<Activation>
    where
        F: FnOnce(&SwitchPlan) -> bool,
    {
        let mut locked = self.lock()?;
        let plan = self.plan_with(locked.index(), profile)?;

        let mut deactivated = None;
        let mut returned = Vec::new();
        if plan.requires_deactivation() {
            if !confirm(&plan) {
                debug!(profile, "activation declined");
                return Ok(Activation::Declined);
            }
            // requires_deactivation guarantees an active config
            if let Some(current) = plan.current.as_deref() {
                returned = self.deactivate_locked(&mut locked, current)?;
                deactivated = Some(current.to_string());
            }
        }

        self.ensure_profile_dir(profile)?;
        let storage = self.layout.profile_dir(profile);
        let moves = list_subdirectories(&storage)?.into_iter().map(|dir| {
            let source = storage.join(&dir);
            let dest = self.layout.live_path(&dir);
            PlannedMove::new(dir, source, dest)
        });

        fs::create_dir_all(&self.layout.live_config_dir)
            .map_err(|e| DotmanError::io(&self.layout.live_config_dir, e))?;
        let loaded = move_many(moves);
        let failed = loaded.iter().filter(|o| o.is_failed()).count();
        if failed > 0 {
            warn!(profile, failed, "some directories could not be loaded");
        }

        locked.update(|index| index.set_active_profile(profile))?;
        info!(profile, "activated config");

        Ok(Activation::Activated {
            profile: profile.to_string(),
            deactivated,
            returned,
            loaded,
        })
    }

    /// Move every directory tracked by `profile` from the live config
    /// directory back into its storage. Directories not currently live are
    /// reported as missing. Clears the active config if it was `profile`.
    pub fn deactivate(&self, profile: &str) -> Result<Vec<RelocationOutcome>> {
        let mut locked = self.lock()?;
        if !locked.index().has_profile(profile) {
            return Err(DotmanError::ProfileNotFound(profile.to_string()));
        }
        self.deactivate_locked(&mut locked, profile)
    }

    fn deactivate_locked(
        &self,
        locked: &mut LockedIndex,
        profile: &str,
    ) -> Result<Vec<RelocationOutcome>> {
        self.ensure_profile_dir(profile)?;

        let tracked = locked.index().tracked_dirs(profile).unwrap_or_default();
        let mut outcomes = Vec::with_capacity(tracked.len());
        for dir in tracked {
            let source = self.layout.live_path(&dir);
            let dest = self.layout.stored_path(profile, &dir);
            let planned = PlannedMove::new(dir, source, dest);

            // Hand-edited entries like `../x` would escape the config directory
            if let Err(e) = validate_dir_name(&planned.name) {
                warn!(profile, dir = %planned.name, "refusing to move tracked entry");
                outcomes.push(RelocationOutcome::rejected(planned, e.to_string()));
                continue;
            }
            outcomes.extend(move_many([planned]));
        }

        if locked.index().active_profile() == Some(profile) {
            locked.update(|index| {
                index.clear_active_profile();
                Ok(())
            })?;
        }
        info!(profile, "deactivated config");
        Ok(outcomes)
    }

    pub fn active_profile(&self) -> Result<Option<String>> {
        Ok(self.index()?.active_profile().map(str::to_string))
    }

    pub fn is_tracked(&self, dir: &str) -> Result<bool> {
        Ok(self.index()?.is_tracked(dir))
    }

    /// Configs known to the index or present in storage, sorted by name
    pub fn list_profiles(&self) -> Result<Vec<ProfileSummary>> {
        let index = self.index()?;
        let stored = list_subdirectories(&self.layout.profile_storage_root)?;

        let mut names: Vec<String> = index.profile_names().map(str::to_string).collect();
        names.extend(stored.iter().cloned());
        names.sort();
        names.dedup();

        Ok(names
            .into_iter()
            .map(|name| ProfileSummary {
                tracked: index.tracked_dirs(&name).map_or(0, |dirs| dirs.len()),
                indexed: index.has_profile(&name),
                stored: stored.contains(&name),
                active: index.active_profile() == Some(name.as_str()),
                name,
            })
            .collect())
    }

    /// Tracked directory names by config
    pub fn list_tracked(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let index = self.index()?;
        Ok(index
            .profile_names()
            .map(|name| (name.to_string(), index.tracked_dirs(name).unwrap_or_default()))
            .collect())
    }

    /// Subdirectories of the live config directory and who tracks them
    pub fn live_directories(&self) -> Result<Vec<LiveDirectory>> {
        let index = self.index()?;
        Ok(list_subdirectories(&self.layout.live_config_dir)?
            .into_iter()
            .map(|name| LiveDirectory {
                tracked_by: index.tracked_by(&name).map(str::to_string),
                name,
            })
            .collect())
    }
}
