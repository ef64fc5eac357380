//! persisted session credentials

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::errors::Error;

/// Keys the session layer reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    UserId,
    DeviceId,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 4] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::UserId,
        CredentialKey::DeviceId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "token",
            CredentialKey::RefreshToken => "refreshToken",
            CredentialKey::UserId => "userId",
            CredentialKey::DeviceId => "deviceId",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value storage that outlives a single client.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&self, key: &str) -> Result<(), Error>;

    fn credential(&self, key: CredentialKey) -> Option<String> {
        self.get(key.as_str()).filter(|value| !value.is_empty())
    }

    fn set_credential(&self, key: CredentialKey, value: &str) -> Result<(), Error> {
        self.set(key.as_str(), value)
    }

    /// Removes every credential key plus `extra_keys`.
    fn clear_session(&self, extra_keys: &[String]) -> Result<(), Error> {
        for key in CredentialKey::ALL {
            self.remove(key.as_str())?;
        }
        for key in extra_keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.lock().remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
pub struct FileCredentialStore {
    path: PathBuf,
    values: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Mutex::new(None),
        }
    }

    fn with_values<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, Error> {
        let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        match guard.as_mut() {
            Some(values) => Ok(f(values)),
            None => Err(Error::Config("credential store failed to load".into())),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, Error> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.with_values(|values| values.get(key).cloned()) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %self.path.display(), key, error = %err, "credentials.load_failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let snapshot = self.with_values(|values| {
            values.insert(key.to_string(), value.to_string());
            values.clone()
        })?;
        self.persist(&snapshot)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let snapshot = self.with_values(|values| values.remove(key).map(|_| values.clone()))?;
        match snapshot {
            Some(values) => self.persist(&values),
            None => Ok(()),
        }
    }
}
