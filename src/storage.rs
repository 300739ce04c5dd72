//! Durable client-side state
//!
//! A small string map persisted as JSON. It holds exactly three things: the
//! bearer credential, the language preference and the theme preference, each
//! under its own fixed key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const CREDENTIAL_KEY: &str = "access_token";
pub const LANGUAGE_KEY: &str = "lang";
pub const THEME_KEY: &str = "theme";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value store surviving restarts
///
/// Writes are whole-value sets or deletes, so concurrent writers from the
/// gateway and the session cannot leave a half-written entry behind.
#[derive(Debug)]
pub struct DurableStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl DurableStore {
    /// Open (or lazily create) a store backed by `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        debug!("Opened durable store at {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            path: Some(path),
            entries: RwLock::new(entries),
        })
    }

    /// Like [`DurableStore::open`], but a corrupt file is treated as empty.
    ///
    /// The unreadable contents are replaced on the next write.
    pub fn open_or_reset(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        match Self::open(&path) {
            Err(StorageError::Corrupt { source, .. }) => {
                warn!(
                    "Store at {} is unreadable ({}); starting empty",
                    path.display(),
                    source
                );
                Ok(Self {
                    path: Some(path),
                    entries: RwLock::new(BTreeMap::new()),
                })
            }
            other => other,
        }
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Write `key`. Memory only changes once the file has been written.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    /// Delete `key`. Deleting a missing key is a no-op.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    // ========================================================================
    // Credential
    // ========================================================================

    pub fn credential(&self) -> Option<String> {
        self.get(CREDENTIAL_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_credential(&self, token: &str) -> Result<(), StorageError> {
        self.set(CREDENTIAL_KEY, token)
    }

    pub fn clear_credential(&self) -> Result<(), StorageError> {
        self.remove(CREDENTIAL_KEY)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })
    }
}

// ============================================================================
// Preferences
// ============================================================================

/// UI language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
    Ar,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::En => "en",
            Self::Ar => "ar",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "fr" => Some(Self::Fr),
            "en" => Some(Self::En),
            "ar" => Some(Self::Ar),
            _ => None,
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Self::Ar)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Colour theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Language and theme, each read and written independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preferences {
    pub language: Language,
    pub theme: Theme,
}

impl Preferences {
    /// Read both preferences, falling back to defaults for missing or
    /// unrecognised values
    pub fn load(store: &DurableStore, default_theme: Theme) -> Self {
        let language = match store.get(LANGUAGE_KEY) {
            Some(code) => Language::parse(&code).unwrap_or_else(|| {
                warn!("Ignoring unknown stored language '{}'", code);
                Language::default()
            }),
            None => Language::default(),
        };
        let theme = store
            .get(THEME_KEY)
            .and_then(|name| Theme::parse(&name))
            .unwrap_or(default_theme);

        Self { language, theme }
    }

    pub fn set_language(
        &mut self,
        store: &DurableStore,
        language: Language,
    ) -> Result<(), StorageError> {
        store.set(LANGUAGE_KEY, language.code())?;
        self.language = language;
        Ok(())
    }

    pub fn set_theme(&mut self, store: &DurableStore, theme: Theme) -> Result<(), StorageError> {
        store.set(THEME_KEY, theme.name())?;
        self.theme = theme;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "challenge-desk-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.json");
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_credential_survives_reopen() {
        let path = temp_store_path("reopen");

        let store = DurableStore::open(&path).unwrap();
        assert_eq!(store.credential(), None);
        store.set_credential("jwt-abc").unwrap();

        let reopened = DurableStore::open(&path).unwrap();
        assert_eq!(reopened.credential().as_deref(), Some("jwt-abc"));

        reopened.clear_credential().unwrap();
        let reopened = DurableStore::open(&path).unwrap();
        assert_eq!(reopened.credential(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = DurableStore::in_memory();
        store.clear_credential().unwrap();
        store.set_credential("t").unwrap();
        store.clear_credential().unwrap();
        store.clear_credential().unwrap();
        assert_eq!(store.credential(), None);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let path = temp_store_path("corrupt");
        std::fs::write(&path, b"not json").unwrap();

        let err = DurableStore::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn test_corrupt_file_can_be_recovered() {
        let path = temp_store_path("recover");
        std::fs::write(&path, b"{\"access_token\": ").unwrap();

        let store = DurableStore::open_or_reset(&path).unwrap();
        assert_eq!(store.credential(), None);
        store.clear_credential().unwrap();
        store.set(THEME_KEY, "light").unwrap();

        let reopened = DurableStore::open(&path).unwrap();
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("light"));
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let path = std::env::temp_dir()
            .join(format!("challenge-desk-missing-{}", std::process::id()))
            .join("nested")
            .join("store.json");
        let store = DurableStore::open(&path).unwrap();

        assert!(matches!(
            store.set_credential("jwt"),
            Err(StorageError::Io { .. })
        ));
        assert_eq!(store.credential(), None);
    }

    #[test]
    fn test_preferences_defaults_and_fallbacks() {
        let store = DurableStore::in_memory();
        let prefs = Preferences::load(&store, Theme::Dark);
        assert_eq!(prefs.language, Language::Fr);
        assert_eq!(prefs.theme, Theme::Dark);

        store.set(LANGUAGE_KEY, "de").unwrap();
        store.set(THEME_KEY, "solarized").unwrap();
        let prefs = Preferences::load(&store, Theme::Light);
        assert_eq!(prefs.language, Language::Fr);
        assert_eq!(prefs.theme, Theme::Light);
    }

    #[test]
    fn test_preferences_written_independently() {
        let store = DurableStore::in_memory();
        let mut prefs = Preferences::load(&store, Theme::Light);

        prefs.set_language(&store, Language::Ar).unwrap();
        assert_eq!(store.get(LANGUAGE_KEY).as_deref(), Some("ar"));
        assert_eq!(store.get(THEME_KEY), None);
        assert!(prefs.language.is_rtl());

        prefs.set_theme(&store, Theme::Dark).unwrap();
        let reloaded = Preferences::load(&store, Theme::Light);
        assert_eq!(reloaded, prefs);
    }
}
