//! The persisted tracking index (`~/.dotman/tracked.yaml`).
//!
//! The document maps every config (profile) to the directory names it owns and
//! records which config is currently loaded into `~/.config`:
//!
//! ```yaml
//! configs:
//!   work:
//!     nvim: true
//!   home: {}
//! active_config: work
//! ```
//!
//! Every operation reloads the document, and every mutation saves it right away.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{DotmanError, Result};

/// Tracked directory name -> marker. Only key presence matters.
pub type ProfileEntry = BTreeMap<String, bool>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingIndex {
    #[serde(rename = "configs", default, deserialize_with = "deserialize_profiles")]
    profiles: BTreeMap<String, ProfileEntry>,

    /// Stored as an empty string when nothing is active
    #[serde(rename = "active_config", default, with = "active_config")]
    active_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl TrackingIndex {
    /// Read the index, returning an empty one if the document doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| DotmanError::io(path, e))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut index: Self = serde_yaml::from_str(content).map_err(|source| DotmanError::Document {
            path: path.to_path_buf(),
            source,
        })?;

        // The active config must name an existing entry
        if let Some(active) = index.active_profile.as_deref()
            && !index.profiles.contains_key(active)
        {
            warn!(active, path = %path.display(), "active config is not in the tracking file, ignoring");
            index.active_profile = None;
        }
        Ok(index)
    }

    fn render(&self, path: &Path) -> Result<String> {
        serde_yaml::to_string(self).map_err(|source| DotmanError::Document {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the whole index, replacing the previous document.
    ///
    /// Writes a temp file next to the target and renames it over, so a crash
    /// never leaves a half-written document. This takes no lock: the rename
    /// swaps the file out from under any `LockedIndex` held on `path`, so only
    /// use it when no dotman process is running. `ProfileManager` writes
    /// through `LockedIndex::update` instead.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DotmanError::io(parent, e))?;
        }

        let content = self.render(path)?;

        let temp_path = path.with_extension("yaml.tmp");
        std::fs::write(&temp_path, content).map_err(|e| DotmanError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| DotmanError::io(path, e))
    }

    /// Add an empty entry for `name`. Returns false if it already exists.
    pub fn create_profile(&mut self, name: &str) -> bool {
        if self.profiles.contains_key(name) {
            return false;
        }
        self.profiles.insert(name.to_string(), ProfileEntry::new());
        true
    }

    /// Mark `dir` as belonging to `profile`. The profile must already exist.
    pub fn track_directory(&mut self, profile: &str, dir: &str) -> Result<()> {
        let entry = self
            .profiles
            .get_mut(profile)
            .ok_or_else(|| DotmanError::ProfileNotFound(profile.to_string()))?;
        entry.insert(dir.to_string(), true);
        Ok(())
    }

    /// True if any profile tracks `dir`
    pub fn is_tracked(&self, dir: &str) -> bool {
        self.tracked_by(dir).is_some()
    }

    /// Name of the first profile (in name order) tracking `dir`
    pub fn tracked_by(&self, dir: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|(_, entry)| entry.contains_key(dir))
            .map(|(name, _)| name.as_str())
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Profile names in lexicographic order
    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Directory names tracked by `profile`, or None if there is no such profile
    pub fn tracked_dirs(&self, profile: &str) -> Option<Vec<String>> {
        self.profiles
            .get(profile)
            .map(|entry| entry.keys().cloned().collect())
    }

    pub fn active_profile(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    /// Mark `name` active. Rejects names missing from the index.
    pub fn set_active_profile(&mut self, name: &str) -> Result<()> {
        if !self.has_profile(name) {
            return Err(DotmanError::ProfileNotFound(name.to_string()));
        }
        self.active_profile = Some(name.to_string());
        Ok(())
    }

    pub fn clear_active_profile(&mut self) {
        self.active_profile = None;
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Exclusive handle on the tracking document for one load-mutate-save cycle.
///
/// Holds an advisory lock until dropped, so a second dotman process blocks
/// instead of interleaving writes.
pub struct LockedIndex {
    file: File,
    index: TrackingIndex,
    path: PathBuf,
}

impl LockedIndex {
    /// Open and lock the tracking document, creating it if needed
    pub fn lock(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DotmanError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| DotmanError::io(path, e))?;

        // Blocks until available
        file.lock_exclusive().map_err(|e| DotmanError::io(path, e))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| DotmanError::io(path, e))?;
        let index = TrackingIndex::parse(&content, path)?;

        Ok(Self {
            file,
            index,
            path: path.to_path_buf(),
        })
    }

    pub fn index(&self) -> &TrackingIndex {
        &self.index
    }

    /// Apply `f` to the index and save immediately
    pub fn update<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TrackingIndex) -> Result<T>,
    {
        let value = f(&mut self.index)?;
        self.index.updated_at = Some(Utc::now());
        self.save()?;
        Ok(value)
    }

    fn save(&mut self) -> Result<()> {
        let content = self.index.render(&self.path)?;
        let path = &self.path;

        self.file.set_len(0).map_err(|e| DotmanError::io(path, e))?;
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| DotmanError::io(path, e))?;
        self.file
            .write_all(content.as_bytes())
            .map_err(|e| DotmanError::io(path, e))?;
        self.file.sync_all().map_err(|e| DotmanError::io(path, e))
    }
}

impl Drop for LockedIndex {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn deserialize_profiles<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, ProfileEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    // `work: ~` is how an empty config can look after hand editing
    let raw = Option::<BTreeMap<String, Option<ProfileEntry>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, entry)| (name, entry.unwrap_or_default()))
        .collect())
}

mod active_config {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(d)?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let index = TrackingIndex::load(&temp_dir.path().join("tracked.yaml")).unwrap();
        assert_eq!(index.profile_names().count(), 0);
        assert!(index.active_profile().is_none());
    }

    #[test]
    fn test_create_profile_twice() {
        let mut index = TrackingIndex::default();
        assert!(index.create_profile("work"));
        assert!(!index.create_profile("work"));
        assert_eq!(index.profile_names().collect::<Vec<_>>(), vec!["work"]);
    }

    #[test]
    fn test_track_requires_profile() {
        let mut index = TrackingIndex::default();
        let err = index.track_directory("ghost", "nvim").unwrap_err();
        assert!(matches!(err, DotmanError::ProfileNotFound(name) if name == "ghost"));
        assert!(!index.has_profile("ghost"));
    }

    #[test]
    fn test_is_tracked_across_profiles() {
        let mut index = TrackingIndex::default();
        index.create_profile("home");
        index.create_profile("work");
        assert!(!index.is_tracked("nvim"));

        index.track_directory("work", "nvim").unwrap();
        assert!(index.is_tracked("nvim"));
        assert_eq!(index.tracked_by("nvim"), Some("work"));
        assert_eq!(index.tracked_dirs("work"), Some(vec!["nvim".to_string()]));
        assert_eq!(index.tracked_dirs("home"), Some(vec![]));
        assert_eq!(index.tracked_dirs("ghost"), None);
    }

    #[test]
    fn test_active_profile_must_exist() {
        let mut index = TrackingIndex::default();
        assert!(index.set_active_profile("work").is_err());
        assert!(index.active_profile().is_none());

        index.create_profile("work");
        index.set_active_profile("work").unwrap();
        assert_eq!(index.active_profile(), Some("work"));

        index.clear_active_profile();
        assert!(index.active_profile().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");

        let mut index = TrackingIndex::default();
        index.create_profile("work");
        index.track_directory("work", "nvim").unwrap();
        index.set_active_profile("work").unwrap();
        index.save(&path).unwrap();

        let loaded = TrackingIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert!(loaded.is_tracked("nvim"));
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_document_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");

        let mut index = TrackingIndex::default();
        index.create_profile("work");
        index.track_directory("work", "nvim").unwrap();
        index.save(&path).unwrap();

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["configs"]["work"]["nvim"], serde_yaml::Value::Bool(true));
        assert_eq!(doc["active_config"], serde_yaml::Value::String(String::new()));
    }

    #[test]
    fn test_parse_hand_written_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");
        std::fs::write(
            &path,
            "configs:\n  work:\n    nvim: true\n    kitty: true\n  empty: ~\nactive_config: \"\"\n",
        )
        .unwrap();

        let index = TrackingIndex::load(&path).unwrap();
        assert!(index.has_profile("empty"));
        assert_eq!(index.tracked_dirs("empty"), Some(vec![]));
        assert_eq!(
            index.tracked_dirs("work"),
            Some(vec!["kitty".to_string(), "nvim".to_string()])
        );
        assert!(index.active_profile().is_none());
    }

    #[test]
    fn test_only_active_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");
        std::fs::write(&path, "active_config: \"\"\n").unwrap();

        let index = TrackingIndex::load(&path).unwrap();
        assert_eq!(index.profile_names().count(), 0);
    }

    #[test]
    fn test_unknown_active_config_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");
        std::fs::write(&path, "configs:\n  work: {}\nactive_config: ghost\n").unwrap();

        let index = TrackingIndex::load(&path).unwrap();
        assert!(index.has_profile("work"));
        assert_eq!(index.active_profile(), None);

        // Next locked write persists the cleared value
        let mut locked = LockedIndex::lock(&path).unwrap();
        assert_eq!(locked.index().active_profile(), None);
        locked.update(|index| Ok(index.create_profile("home"))).unwrap();
        drop(locked);

        let doc: serde_yaml::Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["active_config"], serde_yaml::Value::String(String::new()));
    }

    #[test]
    fn test_locked_index_reads_saved_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tracked.yaml");

        let mut index = TrackingIndex::default();
        index.create_profile("work");
        index.track_directory("work", "nvim").unwrap();
        index.set_active_profile("work").unwrap();
        index.save(&path).unwrap();
        assert!(!path.with_extension("yaml.tmp").exists());

        let locked = LockedIndex::lock(&path).unwrap();
        assert_eq!(locked.index(), &index);
    }

    #[test]
    fn test_malformed_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");
        std::fs::write(&path, "configs: [unclosed").unwrap();

        let err = TrackingIndex::load(&path).unwrap_err();
        assert!(matches!(err, DotmanError::Document { .. }));
    }

    #[test]
    fn test_locked_index_update() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tracked.yaml");

        {
            let mut locked = LockedIndex::lock(&path).unwrap();
            assert_eq!(locked.index().profile_names().count(), 0);
            let created = locked.update(|index| Ok(index.create_profile("personal"))).unwrap();
            assert!(created);
            locked
                .update(|index| index.track_directory("personal", "fish"))
                .unwrap();
        }

        let index = TrackingIndex::load(&path).unwrap();
        assert!(index.is_tracked("fish"));
        assert!(index.updated_at().is_some());
    }

    #[test]
    fn test_locked_index_failed_update_keeps_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracked.yaml");

        let mut locked = LockedIndex::lock(&path).unwrap();
        locked.update(|index| Ok(index.create_profile("work"))).unwrap();
        assert!(locked.update(|index| index.set_active_profile("ghost")).is_err());
        drop(locked);

        let index = TrackingIndex::load(&path).unwrap();
        assert!(index.has_profile("work"));
        assert!(index.active_profile().is_none());
    }
}
