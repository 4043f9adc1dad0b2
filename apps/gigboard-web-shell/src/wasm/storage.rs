use gigboard_client_core::DurableStorage;

/// `window.localStorage`. Failed writes (quota, private mode) are logged.
pub(super) struct BrowserStorage {
    storage: web_sys::Storage,
}

impl BrowserStorage {
    pub(super) fn local() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok()??;
        Some(Self { storage })
    }
}

impl DurableStorage for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if self.storage.set_item(key, value).is_err() {
            tracing::warn!(key, "Failed to write local storage");
        }
    }

    fn remove(&self, key: &str) {
        if self.storage.remove_item(key).is_err() {
            tracing::warn!(key, "Failed to remove local storage entry");
        }
    }
}
