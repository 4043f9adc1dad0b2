use std::cell::RefCell;
use std::rc::Rc;

use crate::storage::{ACCESS_TOKEN_KEY, DurableStorage, REFRESH_TOKEN_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// A partial credential write. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenUpdate {
    #[must_use]
    pub fn both(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    #[must_use]
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: None,
        }
    }

    #[must_use]
    pub fn refresh_only(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: Some(refresh_token.into()),
        }
    }
}

/// Owns the access/refresh credential pair and mirrors it into durable storage.
///
/// The pair is rehydrated once in [`TokenStore::load`]; afterwards reads are
/// served from memory. Nothing here can fail.
pub struct TokenStore {
    storage: Rc<dyn DurableStorage>,
    credentials: RefCell<Credentials>,
}

impl TokenStore {
    pub fn load(storage: Rc<dyn DurableStorage>) -> Self {
        let credentials = Credentials {
            access_token: non_empty(storage.get(ACCESS_TOKEN_KEY)),
            refresh_token: non_empty(storage.get(REFRESH_TOKEN_KEY)),
        };
        tracing::debug!(
            has_access_token = credentials.access_token.is_some(),
            has_refresh_token = credentials.refresh_token.is_some(),
            "Rehydrated credentials"
        );
        Self {
            storage,
            credentials: RefCell::new(credentials),
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.credentials.borrow().access_token.clone()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.credentials.borrow().refresh_token.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Credentials {
        self.credentials.borrow().clone()
    }

    /// Overwrites each present (non-empty) field in memory and in storage.
    pub fn set_tokens(&self, update: TokenUpdate) {
        let mut credentials = self.credentials.borrow_mut();
        if let Some(access_token) = non_empty(update.access_token) {
            self.storage.set(ACCESS_TOKEN_KEY, &access_token);
            credentials.access_token = Some(access_token);
        }
        if let Some(refresh_token) = non_empty(update.refresh_token) {
            self.storage.set(REFRESH_TOKEN_KEY, &refresh_token);
            credentials.refresh_token = Some(refresh_token);
        }
    }

    pub fn clear(&self) {
        *self.credentials.borrow_mut() = Credentials::default();
        self.storage.remove(ACCESS_TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
