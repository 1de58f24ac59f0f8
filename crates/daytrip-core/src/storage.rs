//! Flat key-value persistence for the trip catalog and the visited ledger.
//!
//! Each namespace is a single JSON document. Missing documents load as empty;
//! documents that do not parse load as empty too, with a warning the caller
//! can surface once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

pub const TRIP_PLANS_KEY: &str = "tripPlans";
pub const VISITED_PLACES_KEY: &str = "completedActivities";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create data dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, value)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("failed to lock in-memory store"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("failed to lock in-memory store"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A loaded namespace plus the warning to show if its document was corrupt.
pub(crate) struct Loaded<T> {
    pub value: T,
    pub warning: Option<String>,
}

pub(crate) fn load_namespace<T>(store: &dyn KeyValueStore, key: &str) -> Result<Loaded<T>>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get(key)? else {
        return Ok(Loaded {
            value: T::default(),
            warning: None,
        });
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Loaded {
            value,
            warning: None,
        }),
        Err(err) => {
            warn!(key, error = %err, "stored data is corrupt; starting empty");
            Ok(Loaded {
                value: T::default(),
                warning: Some(format!(
                    "could not load saved data ({key}); local storage might be corrupt: {err}"
                )),
            })
        }
    }
}

pub(crate) fn save_namespace<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).with_context(|| format!("failed to encode {key}"))?;
    store.set(key, &raw)
}
