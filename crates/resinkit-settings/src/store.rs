//! Settings store
//!
//! The process-wide settings handle. Every component that needs settings is
//! given a clone of the store; clones share one `RwLock`. Nothing is reloaded
//! or written implicitly: callers use `refresh`, `save`, `restore` and
//! `apply_from_file` explicitly.

use crate::config::Settings;
use crate::error::{SettingsError, SettingsResult};
use parking_lot::{RwLock, RwLockReadGuard};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared, internally synchronized settings handle
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Open a store backed by `path`
    ///
    /// A missing file is not an error: the store starts with defaults and the
    /// file is created on the first `save`.
    pub fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let settings = if path.exists() {
            Settings::load_from_file(&path)?
        } else {
            tracing::info!("No settings file at {}, using defaults", path.display());
            Settings::default()
        };
        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            path: Some(path),
        })
    }

    /// A store with no backing file
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current settings
    pub fn get(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Borrow the current settings without copying
    pub fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read()
    }

    /// Modify settings in place; the change is kept only if it validates
    pub fn update<F>(&self, f: F) -> SettingsResult<()>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.settings.write();
        let mut candidate = guard.clone();
        f(&mut candidate);
        candidate.validate()?;
        *guard = candidate;
        Ok(())
    }

    /// Re-read the backing file, discarding unsaved changes
    pub fn refresh(&self) -> SettingsResult<()> {
        let path = self.path.as_ref().ok_or(SettingsError::NoBackingFile)?;
        let loaded = Settings::load_from_file(path)?;
        *self.settings.write() = loaded;
        tracing::debug!("Settings refreshed from {}", path.display());
        Ok(())
    }

    /// Write the current settings to the backing file
    pub fn save(&self) -> SettingsResult<()> {
        let path = self.path.as_ref().ok_or(SettingsError::NoBackingFile)?;
        self.settings.read().save_to_file(path)?;
        tracing::debug!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Reset to defaults, keeping job identity
    pub fn restore(&self) {
        let mut guard = self.settings.write();
        let defaults = Settings {
            job_name: std::mem::take(&mut guard.job_name),
            job_id: std::mem::take(&mut guard.job_id),
            print_data_dir: guard.print_data_dir.clone(),
            staging_dir: guard.staging_dir.clone(),
            registered: guard.registered,
            ..Settings::default()
        };
        *guard = defaults;
    }

    /// Merge the keys of a JSON settings document over the current settings
    ///
    /// Nested layer-type objects merge key by key. The result must validate,
    /// otherwise nothing changes. The merged settings are saved when the store
    /// has a backing file.
    pub fn apply_json(&self, text: &str) -> SettingsResult<()> {
        let incoming: Value = serde_json::from_str(text)?;
        if !incoming.is_object() {
            return Err(SettingsError::LoadError(
                "settings document must be a JSON object".to_string(),
            ));
        }
        {
            let mut guard = self.settings.write();
            let mut merged = serde_json::to_value(&*guard)?;
            merge(&mut merged, incoming);
            let candidate: Settings = serde_json::from_value(merged)?;
            candidate.validate()?;
            *guard = candidate;
        }
        if self.path.is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Apply a settings document staged on disk
    pub fn apply_from_file(&self, path: &Path) -> SettingsResult<()> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;
        self.apply_json(&text)?;
        tracing::info!("Applied settings from {}", path.display());
        Ok(())
    }

    /// Current settings as pretty JSON, used when logging fatal errors
    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(&*self.settings.read())?)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory(Settings::default())
    }
}

fn merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
