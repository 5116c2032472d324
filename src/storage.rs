//! Secure Storage Module
//!
//! Durable key-value storage for the client and the single-slot token store
//! built on top of it. On Windows values are encrypted with DPAPI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};


/// Key under which the bearer token is persisted.
pub const TOKEN_KEY: &str = "token";

const PROBE_KEY: &str = "__probe__";

/// A durable string key-value medium.
///
/// Implementations report every failure as a [`StorageError`]; callers
/// decide whether the failure matters.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Secure storage using Windows DPAPI for encryption
pub struct SecureStorage {
    storage_path: PathBuf,
}

impl SecureStorage {
    /// Create a storage rooted at `storage_path`, creating the directory.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();

        // A missing directory surfaces later as Io errors on every call
        if let Err(e) = std::fs::create_dir_all(&storage_path) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("Secure storage initialized at: {:?}", storage_path);

        Self { storage_path }
    }

    /// Storage under the user's local data directory.
    pub fn default_location() -> Self {
        Self::new(default_data_dir())
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Save data securely using DPAPI
    pub fn save<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let encrypted = self.encrypt(json.as_bytes())?;

        std::fs::write(self.file_path(key), encrypted)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Saved encrypted data for key: {}", key);
        Ok(())
    }

    /// Load data securely using DPAPI
    pub fn load<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, StorageError> {
        let encrypted = std::fs::read(self.file_path(key))
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let decrypted = self.decrypt(&encrypted)?;

        let json = String::from_utf8(decrypted)
            .map_err(|e| StorageError::Decryption(e.to_string()))?;

        serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Delete stored data
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.file_path(key);

        if file_path.exists() {
            std::fs::remove_file(&file_path)
                .map_err(|e| StorageError::Io(e.to_string()))?;
            debug!("Deleted stored data for key: {}", key);
        }

        Ok(())
    }

    /// Check if key exists
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}.dat", key))
    }

    #[cfg(windows)]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        dpapi::protect(data)
            .ok_or_else(|| StorageError::Encryption("DPAPI encryption failed".into()))
    }

    #[cfg(windows)]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        dpapi::unprotect(data)
            .ok_or_else(|| StorageError::Decryption("DPAPI decryption failed".into()))
    }

    #[cfg(not(windows))]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        // Plaintext outside Windows; the directory is per-user
        Ok(data.to_vec())
    }

    #[cfg(not(windows))]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(data.to_vec())
    }
}

/// Per-user DPAPI protection for values at rest.
#[cfg(windows)]
mod dpapi {
    use std::ptr::null_mut;

    use windows::Win32::Foundation::{LocalFree, HLOCAL};
    use windows::Win32::Security::Cryptography::{
        CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
    };

    pub fn protect(data: &[u8]) -> Option<Vec<u8>> {
        transform(data, |input, output| unsafe {
            CryptProtectData(input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, output)
        })
    }

    pub fn unprotect(data: &[u8]) -> Option<Vec<u8>> {
        transform(data, |input, output| unsafe {
            CryptUnprotectData(input, None, None, None, None, CRYPTPROTECT_UI_FORBIDDEN, output)
        })
    }

    /// Run one DPAPI call over `data` and take ownership of the blob it
    /// allocates.
    fn transform<F>(data: &[u8], call: F) -> Option<Vec<u8>>
    where
        F: FnOnce(*const CRYPT_INTEGER_BLOB, *mut CRYPT_INTEGER_BLOB) -> windows::core::Result<()>,
    {
        let input = CRYPT_INTEGER_BLOB {
            cbData: u32::try_from(data.len()).ok()?,
            pbData: data.as_ptr() as *mut u8,
        };
        let mut output = CRYPT_INTEGER_BLOB {
            cbData: 0,
            pbData: null_mut(),
        };

        call(&input, &mut output).ok()?;

        // SAFETY: on success DPAPI returns cbData bytes at pbData, LocalAlloc'd for the caller
        unsafe {
            let bytes = std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();
            let _ = LocalFree(HLOCAL(output.pbData.cast()));
            Some(bytes)
        }
    }
}

impl KeyValueStore for SecureStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.exists(key) {
            return Ok(None);
        }
        self.load::<String>(key).map(Some)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.save(key, &value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.delete(key)
    }
}

/// Default root for persisted client state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("IgnitionLab")
}

/// In-process storage. Can be switched off to behave like a medium that
/// refuses every access.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage on which every operation fails.
    pub fn unavailable() -> Self {
        let storage = Self::default();
        storage.set_available(false);
        storage
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        Ok(())
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.check()?;
        self.entries.lock().map_err(|_| StorageError::Unavailable)
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Single-slot persistence of the bearer token.
///
/// Never fails outward: storage errors are logged and turned into `None`
/// or `false`.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Stored token, or `None` if absent or the storage failed.
    pub fn read(&self) -> Option<String> {
        match self.backend.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Error reading stored token: {}", e);
                None
            }
        }
    }

    /// Persist `token`, replacing any previous one.
    pub fn write(&self, token: &str) -> bool {
        match self.backend.set(TOKEN_KEY, token) {
            Ok(()) => {
                info!("Stored token ({} chars)", token.len());
                true
            }
            Err(e) => {
                error!("Error storing token: {}", e);
                false
            }
        }
    }

    /// Remove the stored token. Succeeds when nothing is stored.
    pub fn clear(&self) -> bool {
        match self.backend.remove(TOKEN_KEY) {
            Ok(()) => true,
            Err(e) => {
                error!("Error removing stored token: {}", e);
                false
            }
        }
    }

    /// Whether the medium accepts a write and a remove right now.
    pub fn is_available(&self) -> bool {
        let probe = self
            .backend
            .set(PROBE_KEY, PROBE_KEY)
            .and_then(|()| self.backend.remove(PROBE_KEY));
        if let Err(e) = &probe {
            debug!("Storage probe failed: {}", e);
        }
        probe.is_ok()
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Storage unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> (Arc<MemoryStorage>, TokenStore) {
        let backend = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn write_then_read_returns_token() {
        let (_, store) = memory_store();
        assert!(store.write("abc.def.ghi"));
        assert_eq!(store.read().as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn later_write_overwrites_earlier() {
        let (_, store) = memory_store();
        store.write("first");
        store.write("second");
        assert_eq!(store.read().as_deref(), Some("second"));
    }

    #[test]
    fn clear_removes_token_and_is_repeatable() {
        let (_, store) = memory_store();
        store.write("tok");
        assert!(store.clear());
        assert!(store.clear());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn unavailable_storage_degrades_to_failure_values() {
        let store = TokenStore::new(Arc::new(MemoryStorage::unavailable()));
        assert_eq!(store.read(), None);
        assert!(!store.write("tok"));
        assert!(!store.clear());
        assert!(!store.is_available());
    }

    #[test]
    fn storage_failing_after_write_reads_as_absent() {
        let (backend, store) = memory_store();
        store.write("tok");
        backend.set_available(false);
        assert_eq!(store.read(), None);
        backend.set_available(true);
        assert_eq!(store.read().as_deref(), Some("tok"));
    }

    #[test]
    fn probe_leaves_no_entry_behind() {
        let (backend, store) = memory_store();
        assert!(store.is_available());
        assert_eq!(backend.get(PROBE_KEY).unwrap(), None);
    }

    #[test]
    fn secure_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = TokenStore::new(Arc::new(SecureStorage::new(dir.path())));
        assert!(first.write("persisted"));

        let second = TokenStore::new(Arc::new(SecureStorage::new(dir.path())));
        assert_eq!(second.read().as_deref(), Some("persisted"));
        assert!(second.clear());
        assert_eq!(first.read(), None);
    }

    #[test]
    fn secure_storage_on_unusable_path_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = TokenStore::new(Arc::new(SecureStorage::new(&blocker)));
        assert!(!store.write("tok"));
        assert_eq!(store.read(), None);
        assert!(!store.is_available());
    }

    #[cfg(windows)]
    #[test]
    fn dpapi_round_trips_and_rejects_foreign_blobs() {
        let sealed = dpapi::protect(b"abc.def.ghi").unwrap();
        assert_ne!(sealed.as_slice(), b"abc.def.ghi");
        assert_eq!(dpapi::unprotect(&sealed).unwrap(), b"abc.def.ghi");
        assert_eq!(dpapi::unprotect(b"not a dpapi blob"), None);
    }

    #[test]
    fn stored_file_is_sealed_only_on_windows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SecureStorage::new(dir.path());
        storage.save(TOKEN_KEY, &"abc.def.ghi").unwrap();

        let raw = std::fs::read(dir.path().join("token.dat")).unwrap();
        assert_eq!(raw == br#""abc.def.ghi""#, cfg!(not(windows)));
        assert_eq!(storage.load::<String>(TOKEN_KEY).unwrap(), "abc.def.ghi");
    }
}
