use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Where the access/refresh token pair lives between requests.
pub trait TokenStore: Send + Sync {
    fn access(&self) -> Option<String>;
    fn refresh(&self) -> Option<String>;
    fn set_access(&self, access: &str) -> Result<()>;
    fn set_pair(&self, access: &str, refresh: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Tokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    pub fn new() -> MemoryTokenStore {
        MemoryTokenStore::default()
    }

    fn read(&self) -> Tokens {
        match self.tokens.read() {
            Ok(t) => t.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn write(&self, f: impl FnOnce(&mut Tokens)) {
        match self.tokens.write() {
            Ok(mut t) => f(&mut t),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access(&self) -> Option<String> {
        self.read().access_token
    }

    fn refresh(&self) -> Option<String> {
        self.read().refresh_token
    }

    fn set_access(&self, access: &str) -> Result<()> {
        self.write(|t| t.access_token = Some(access.to_string()));
        Ok(())
    }

    fn set_pair(&self, access: &str, refresh: &str) -> Result<()> {
        self.write(|t| {
            t.access_token = Some(access.to_string());
            t.refresh_token = Some(refresh.to_string());
        });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.write(|t| *t = Tokens::default());
        Ok(())
    }
}

/// Tokens persisted as a small JSON file, read through an in-memory copy.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cache: MemoryTokenStore,
}

impl FileTokenStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileTokenStore> {
        let path = path.as_ref().to_path_buf();
        let tokens = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Tokens::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Tokens::default()
        };
        Ok(FileTokenStore {
            path,
            cache: MemoryTokenStore {
                tokens: RwLock::new(tokens),
            },
        })
    }

    fn persist(&self) -> Result<()> {
        let tokens = self.cache.read();
        if tokens == Tokens::default() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&tokens)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access(&self) -> Option<String> {
        self.cache.access()
    }

    fn refresh(&self) -> Option<String> {
        self.cache.refresh()
    }

    fn set_access(&self, access: &str) -> Result<()> {
        self.cache.set_access(access)?;
        self.persist()
    }

    fn set_pair(&self, access: &str, refresh: &str) -> Result<()> {
        self.cache.set_pair(access, refresh)?;
        self.persist()
    }

    fn clear(&self) -> Result<()> {
        self.cache.clear()?;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.access().is_none());
        store.set_pair("a1", "r1").unwrap();
        store.set_access("a2").unwrap();
        assert_eq!(store.access().as_deref(), Some("a2"));
        assert_eq!(store.refresh().as_deref(), Some("r1"));
        store.clear().unwrap();
        assert!(store.refresh().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.set_pair("a1", "r1").unwrap();
        drop(store);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"access_token\": \"a1\""));

        let store = FileTokenStore::open(&path).unwrap();
        assert_eq!(store.access().as_deref(), Some("a1"));
        assert_eq!(store.refresh().as_deref(), Some("r1"));

        store.clear().unwrap();
        assert!(!path.exists());
    }
}
