//! Settings key-value store.
//!
//! Process selection, per-process project selection, the serialized type
//! hierarchy and the roadmap display range all live in a flat string
//! key-value store. The `SettingsStore` trait is the narrow contract the
//! roadmap code depends on; `JsonSettings` backs it with a single JSON file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings key holding the currently selected process id.
pub const KEY_PROCESS: &str = "process";

/// Settings key holding the roadmap range start date (`YYYY-MM-DD`).
pub const KEY_ROADMAP_START: &str = "roadmap-start-date";

/// Settings key holding the roadmap range end date (`YYYY-MM-DD`).
pub const KEY_ROADMAP_END: &str = "roadmap-end-date";

/// Settings key holding the roadmap time unit name.
pub const KEY_ROADMAP_TIME_UNIT: &str = "roadmap-time-unit";

/// Key of the project selected for a process.
pub fn project_key(process_id: &str) -> String {
    format!("project-{process_id}")
}

/// Key of the serialized type hierarchy for a process.
pub fn hierarchy_key(process_id: &str) -> String {
    format!("work-item-hierarchy-{process_id}")
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Narrow contract for reading and writing settings.
pub trait SettingsStore {
    /// Value for `key`, or `None` when it was never written.
    fn get(&self, key: &str) -> Option<String>;

    /// Value for `key`; a missing key is created with `default` first so
    /// later readers observe the same value.
    fn get_or_create(&mut self, key: &str, default: &str) -> Result<String, SettingsError>;

    /// Create or replace `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// File-backed settings store, one pretty-printed JSON object per file.
#[derive(Debug)]
pub struct JsonSettings {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

impl JsonSettings {
    /// Open a settings file, starting empty if it doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self, SettingsError> {
        let values = if path.exists() {
            let text = fs::read_to_string(path)?;
            let doc: SettingsDocument = serde_json::from_str(&text)?;
            doc.settings
        } else {
            BTreeMap::new()
        };
        Ok(JsonSettings {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Save to disk using atomic write (temp file + rename).
    fn save(&self) -> Result<(), SettingsError> {
        let tmp = self.path.with_extension("json.tmp");
        let doc = SettingsDocument {
            settings: self.values.clone(),
        };
        let data = serde_json::to_string_pretty(&doc)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn get_or_create(&mut self, key: &str, default: &str) -> Result<String, SettingsError> {
        if let Some(value) = self.values.get(key) {
            return Ok(value.clone());
        }
        self.values.insert(key.to_string(), default.to_string());
        self.save()?;
        Ok(default.to_string())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

/// Currently selected process id, empty when none was chosen yet.
pub fn current_process_id(settings: &mut impl SettingsStore) -> Result<String, SettingsError> {
    settings.get_or_create(KEY_PROCESS, "")
}

/// Project selected for a process, empty when the process id is empty or no
/// project was chosen.
pub fn current_project_id(
    settings: &mut impl SettingsStore,
    process_id: &str,
) -> Result<String, SettingsError> {
    if process_id.is_empty() {
        return Ok(String::new());
    }
    settings.get_or_create(&project_key(process_id), "")
}
