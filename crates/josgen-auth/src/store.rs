//! Durable token storage
//!
//! `TokenStore` is the only holder of the current token pair. It sits on top
//! of a `KeyValueStore`, the equivalent of browser local storage: string
//! values under fixed string keys. Two backends are provided:
//!
//! - `MemoryStore`: process-local, used by tests and one-shot tools
//! - `FileStore`: a JSON object on disk, written atomically (temp file +
//!   rename) so the CLI keeps its session between invocations
//!
//! Storage is treated as always available. A failed disk write is logged and
//! the in-memory value stays authoritative for the rest of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::token::TokenPair;

/// String key-value storage backing the token store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock cannot leave a HashMap half-written
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}

/// Key-value store persisted as a JSON object in a single file.
///
/// The Mutex serializes writers; every mutation rewrites the whole file,
/// which holds two short strings.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// If the file doesn't exist, its parent directory is created and the file
    /// is written as `{}` so the permissions are set before any token lands in it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let entries: HashMap<String, String> = if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::Parse(format!("parsing token file: {e}")))?
            };
            info!(path = %path.display(), keys = entries.len(), "loaded token file");
            entries
        } else {
            info!(path = %path.display(), "token file not found, starting empty");
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;
            }
            let entries = HashMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        if let Err(e) = write_atomic(&self.path, entries) {
            warn!(path = %self.path.display(), error = %e, "failed to persist token file");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }
}

/// Write the token map to a file atomically with 0600 permissions.
fn write_atomic(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Parse(format!("serializing token file: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".josgen-tokens.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token file");
    Ok(())
}

/// Holder of the current access/refresh token pair.
///
/// Cheap to clone; clones share the same backing store.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Token store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Token store backed by a JSON file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Arc::new(FileStore::open(path)?)))
    }

    /// Save both tokens. No validation of token shape.
    pub fn set_tokens(&self, pair: &TokenPair) {
        self.backend.set(ACCESS_TOKEN_KEY, &pair.access_token);
        self.backend.set(REFRESH_TOKEN_KEY, &pair.refresh_token);
        debug!("stored token pair");
    }

    pub fn access_token(&self) -> Option<String> {
        self.backend.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.backend.get(REFRESH_TOKEN_KEY)
    }

    /// True if an access token is present. Says nothing about whether the
    /// backend will still accept it.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Overwrite only the access token.
    pub fn update_access_token(&self, token: &str) {
        self.backend.set(ACCESS_TOKEN_KEY, token);
        debug!("updated access token");
    }

    /// Remove both tokens. Idempotent.
    pub fn clear_tokens(&self) {
        self.backend.remove(ACCESS_TOKEN_KEY);
        self.backend.remove(REFRESH_TOKEN_KEY);
        debug!("cleared token pair");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tokens_roundtrip() {
        let store = TokenStore::in_memory();
        store.set_tokens(&TokenPair::new("A", "B"));
        assert_eq!(store.access_token().as_deref(), Some("A"));
        assert_eq!(store.refresh_token().as_deref(), Some("B"));
        assert!(store.is_authenticated());
    }

    #[test]
    fn clear_tokens_unauthenticates() {
        let store = TokenStore::in_memory();
        store.set_tokens(&TokenPair::new("A", "B"));
        store.clear_tokens();
        assert!(!store.is_authenticated());
        assert!(store.refresh_token().is_none());

        // Idempotent
        store.clear_tokens();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn empty_store_is_not_authenticated() {
        let store = TokenStore::in_memory();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn update_access_token_keeps_refresh_token() {
        let store = TokenStore::in_memory();
        store.set_tokens(&TokenPair::new("A", "B"));
        store.update_access_token("A2");
        assert_eq!(store.access_token().as_deref(), Some("A2"));
        assert_eq!(store.refresh_token().as_deref(), Some("B"));
    }

    #[test]
    fn clones_share_backend() {
        let store = TokenStore::in_memory();
        let clone = store.clone();
        store.set_tokens(&TokenPair::new("A", "B"));
        assert_eq!(clone.access_token().as_deref(), Some("A"));
    }

    #[test]
    fn file_store_roundtrip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::file(&path).unwrap();
        store.set_tokens(&TokenPair::new("at_1", "rt_1"));

        let reopened = TokenStore::file(&path).unwrap();
        assert_eq!(reopened.access_token().as_deref(), Some("at_1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("rt_1"));
    }

    #[test]
    fn file_store_uses_shared_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::file(&path).unwrap();
        store.set_tokens(&TokenPair::new("at_1", "rt_1"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["josgen_auth_token"], "at_1");
        assert_eq!(parsed["josgen_refresh_token"], "rt_1");
    }

    #[test]
    fn cold_start_creates_empty_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        assert!(!path.exists());
        let store = FileStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn clear_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::file(&path).unwrap();
        store.set_tokens(&TokenPair::new("at_1", "rt_1"));
        store.clear_tokens();

        let reopened = TokenStore::file(&path).unwrap();
        assert!(!reopened.is_authenticated());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json {{").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got: {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn token_file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");

        let store = TokenStore::file(&path).unwrap();
        store.set_tokens(&TokenPair::new("at_1", "rt_1"));

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }
}
