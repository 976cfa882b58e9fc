//! Cached AUID and password storage.
//!
//! The username is kept in a plain single-line file. The password goes into a
//! [`SecretStore`], which is the platform keyring when the `keyring-storage`
//! feature is enabled.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult, SecretStoreError};

pub const AUID_PREFIX: &str = "au";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auid: String,
    pub password: String,
}

impl Credentials {
    pub fn new(auid: impl Into<String>, password: impl Into<String>) -> AppResult<Self> {
        let auid = auid.into().trim().to_string();
        if !is_valid_auid(&auid) {
            return Err(AppError::InvalidCredentials(format!(
                "auid must start with '{}'",
                AUID_PREFIX
            )));
        }

        Ok(Self {
            auid,
            password: password.into(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auid", &self.auid)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn is_valid_auid(auid: &str) -> bool {
    auid.starts_with(AUID_PREFIX)
}

/// Whatever has been cached so far. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedCredentials {
    pub auid: Option<String>,
    pub password: Option<String>,
}

/// Identity-keyed secret storage.
pub trait SecretStore: Send + Sync {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, SecretStoreError>;

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), SecretStoreError>;

    /// Deleting an absent entry is not an error.
    fn delete(&self, service: &str, account: &str) -> Result<(), SecretStoreError>;
}

#[cfg(feature = "keyring-storage")]
pub struct KeyringSecretStore;

#[cfg(feature = "keyring-storage")]
impl KeyringSecretStore {
    fn entry(service: &str, account: &str) -> Result<keyring::Entry, SecretStoreError> {
        keyring::Entry::new(service, account).map_err(|e| {
            SecretStoreError::Unavailable(format!(
                "keyring entry service='{}' account='{}': {}",
                service, account, e
            ))
        })
    }
}

#[cfg(feature = "keyring-storage")]
impl SecretStore for KeyringSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, SecretStoreError> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecretStoreError::Backend(e.to_string())),
        }
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), SecretStoreError> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|e| SecretStoreError::Backend(e.to_string()))
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), SecretStoreError> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretStoreError::Backend(e.to_string())),
        }
    }
}

/// In-process secret store. Nothing survives the process.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), String>>, SecretStoreError>
    {
        self.secrets
            .lock()
            .map_err(|_| SecretStoreError::Backend("memory store poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>, SecretStoreError> {
        Ok(self
            .lock()?
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), SecretStoreError> {
        self.lock()?.insert(
            (service.to_string(), account.to_string()),
            secret.to_string(),
        );
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), SecretStoreError> {
        self.lock()?
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

/// Targets where one of the enabled keyring backends keeps secrets between
/// runs. Elsewhere keyring silently falls back to a non-persistent store.
pub const KEYRING_PERSISTS: bool = cfg!(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
));

/// The platform keyring when available, otherwise an in-memory store.
pub fn default_secret_store() -> Box<dyn SecretStore> {
    #[cfg(feature = "keyring-storage")]
    {
        if !KEYRING_PERSISTS {
            warn!("No persistent keyring on this platform, passwords will not be remembered");
            return Box::new(MemorySecretStore::new());
        }
        Box::new(KeyringSecretStore)
    }

    #[cfg(not(feature = "keyring-storage"))]
    {
        warn!("Built without keyring support, passwords will not be remembered");
        Box::new(MemorySecretStore::new())
    }
}

pub struct CredentialStore {
    username_file: PathBuf,
    service: String,
    account: String,
    secrets: Box<dyn SecretStore>,
}

impl CredentialStore {
    pub fn new(config: &StorageConfig, secrets: Box<dyn SecretStore>) -> Self {
        Self {
            username_file: config.username_file.clone(),
            service: config.keyring_service.clone(),
            account: config.keyring_account.clone(),
            secrets,
        }
    }

    /// Reads whatever is cached. Missing files and unreadable secrets count
    /// as "not stored".
    pub fn load(&self) -> CachedCredentials {
        let auid = match fs::read_to_string(&self.username_file) {
            Ok(content) => Some(content.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) => {
                debug!(
                    "No cached username at {:?}: {}",
                    self.username_file, e
                );
                None
            }
        };

        let password = match self.secrets.get(&self.service, &self.account) {
            Ok(password) => password.filter(|p| !p.is_empty()),
            Err(e) => {
                warn!("Could not read cached password: {}", e);
                None
            }
        };

        CachedCredentials { auid, password }
    }

    pub fn save(&self, credentials: &Credentials) -> AppResult<()> {
        self.save_username(&credentials.auid)?;
        self.save_password(&credentials.password)
    }

    pub fn save_username(&self, auid: &str) -> AppResult<()> {
        if let Some(parent) = self.username_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_private(&self.username_file, auid)?;
        debug!("Username saved to {:?}", self.username_file);
        Ok(())
    }

    pub fn save_password(&self, password: &str) -> AppResult<()> {
        self.secrets.set(&self.service, &self.account, password)?;
        debug!("Password saved to secret store");
        Ok(())
    }

    /// Forgets both the username and the password.
    pub fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.username_file) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.secrets.delete(&self.service, &self.account)?;
        debug!("Cached credentials cleared");
        Ok(())
    }
}

fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600) // Owner read/write only
            .open(path)?;
        file.write_all(content.as_bytes())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CredentialStore {
        let config = StorageConfig {
            username_file: dir.path().join("nested").join("auid.txt"),
            keyring_service: "auprint-test".to_string(),
            keyring_account: "auid".to_string(),
        };
        CredentialStore::new(&config, Box::new(MemorySecretStore::new()))
    }

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn test_keyring_persists_on_desktop_targets() {
        assert!(KEYRING_PERSISTS);
    }

    #[test]
    fn test_credentials_require_au_prefix() {
        assert!(Credentials::new("au123456", "pw").is_ok());
        assert!(matches!(
            Credentials::new("xy123456", "pw"),
            Err(AppError::InvalidCredentials(_))
        ));
        assert_eq!(Credentials::new(" au1 ", "pw").unwrap().auid, "au1");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("au123456", "hunter2").unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("au123456"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_load_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load(), CachedCredentials::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let creds = Credentials::new("au123456", "s3cret").unwrap();

        store.save(&creds).unwrap();

        let cached = store.load();
        assert_eq!(cached.auid.as_deref(), Some("au123456"));
        assert_eq!(cached.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_clear_removes_both() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&Credentials::new("au123456", "s3cret").unwrap())
            .unwrap();

        store.clear().unwrap();
        assert_eq!(store.load(), CachedCredentials::default());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_username_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save_username("au123456").unwrap();

        let mode = fs::metadata(dir.path().join("nested").join("auid.txt"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_store_delete_absent() {
        let secrets = MemorySecretStore::new();
        assert!(secrets.delete("svc", "acct").is_ok());
        assert_eq!(secrets.get("svc", "acct").unwrap(), None);
    }
}
