//! Durable key/value storage that survives process restarts.
//!
//! Storage is a best-effort boundary: write failures are logged and
//! swallowed so that credential bookkeeping can never fail a caller.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const ROLE_KEY: &str = "role";
pub const USER_ID_KEY: &str = "userId";

pub trait DurableStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let storage = Self::new();
        for (key, value) in entries {
            storage.set(key, value);
        }
        storage
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// JSON-object file store used by native front ends.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice::<BTreeMap<String, String>>(&raw).unwrap_or_else(
                |error| {
                    tracing::warn!(error = %error, path = %path.display(), "Ignoring malformed storage file");
                    BTreeMap::new()
                },
            ),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                tracing::warn!(error = %error, path = %path.display(), "Failed to read storage file");
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: RefCell::new(entries),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        let serialized = match serde_json::to_vec_pretty(&*self.entries.borrow()) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::warn!(error = %error, "Failed to serialize storage entries");
                return;
            }
        };
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if let Err(error) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %error, path = %parent.display(), "Failed to create storage directory");
                return;
            }
        }
        if let Err(error) = std::fs::write(&self.path, serialized) {
            tracing::warn!(error = %error, path = %self.path.display(), "Failed to write storage file");
        }
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.flush();
    }

    fn remove(&self, key: &str) {
        let removed = self.entries.borrow_mut().remove(key).is_some();
        if removed {
            self.flush();
        }
    }
}
