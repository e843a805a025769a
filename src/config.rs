//! # Configuration Management Module
//!
//! Questo modulo gestisce le preferenze persistenti e le opzioni di una run.
//!
//! ## Responsabilità:
//! - Definisce `Preferences` con valori di default hard-coded
//! - Carica le preferenze salvate fondendole chiave per chiave sui default
//! - Salva le preferenze in modalità fire-and-forget (errori solo loggati)
//! - Definisce `RunOptions`, le opzioni immutabili di una singola run
//!
//! ## Preferenze:
//! - `allow_overwrite`: Permette di sovrascrivere gli originali (default: false)
//! - `keep_history`: Registra gli esiti nella history (default: true)
//! - `last_output_dir`: Ultima directory di output usata (default: None)
//! - `max_history_entries`: Numero massimo di entry nella history (default: 500)
//! - `suppress_no_transcoder_warning`: Nasconde l'avviso "FFmpeg mancante" (default: false)
//! - `suppress_overwrite_warning`: Nasconde l'avviso sulla sovrascrittura (default: false)
//! - `transcoder_path`: Path esplicito di FFmpeg (default: None = cerca nel PATH)
//!
//! ## Tolleranza:
//! Una chiave mancante o con un valore del tipo sbagliato torna al default;
//! un documento illeggibile torna a tutti i default. Mai un errore fatale.
//!
//! ## Esempio:
//! ```rust,ignore
//! let store = PreferenceStore::new(state_dir.join(PREFERENCES_FILE_NAME));
//! let mut prefs = store.load().await;
//! prefs.last_output_dir = Some(output_dir.clone());
//! store.save_if_changed(&prefs).await;
//! ```

use crate::error::StripError;
use crate::history::DEFAULT_MAX_ENTRIES;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Name of the directory (under the home directory) holding persistent state
pub const STATE_DIR_NAME: &str = ".metastrip";

/// File name of the preference document inside the state directory
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Default location of the state directory (`~/.metastrip`)
pub fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(STATE_DIR_NAME))
}

/// User preferences, persisted as a flat JSON object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub allow_overwrite: bool,
    pub keep_history: bool,
    pub last_output_dir: Option<PathBuf>,
    pub max_history_entries: usize,
    pub suppress_no_transcoder_warning: bool,
    pub suppress_overwrite_warning: bool,
    pub transcoder_path: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            allow_overwrite: false,
            keep_history: true,
            last_output_dir: None,
            max_history_entries: DEFAULT_MAX_ENTRIES,
            suppress_no_transcoder_warning: false,
            suppress_overwrite_warning: false,
            transcoder_path: None,
        }
    }
}

impl Preferences {
    /// Merge a persisted document over the defaults, one key at a time.
    /// Keys that are unknown or hold a value of the wrong type are ignored.
    pub fn merged_over_defaults(content: &str) -> Self {
        let defaults = Self::default();
        let persisted = match serde_json::from_str::<serde_json::Value>(content) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Preferences file is not a JSON object, using defaults");
                return defaults;
            }
        };

        let mut merged = match serde_json::to_value(&defaults) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return defaults,
        };

        for (key, value) in persisted {
            if !merged.contains_key(&key) {
                debug!("Ignoring unknown preference key: {}", key);
                continue;
            }
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value);
            if serde_json::from_value::<Self>(serde_json::Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            } else {
                warn!("Ignoring invalid value for preference '{}'", key);
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged)).unwrap_or(defaults)
    }
}

/// Durable key/value store for `Preferences`
pub struct PreferenceStore {
    path: PathBuf,
    loaded: Mutex<Option<Preferences>>,
}

impl PreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences merged over defaults. Never fails.
    pub async fn load(&self) -> Preferences {
        let prefs = match fs::read_to_string(&self.path).await {
            Ok(content) => Preferences::merged_over_defaults(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                warn!("Could not read preferences {}: {}", self.path.display(), e);
                Preferences::default()
            }
        };
        *self.loaded.lock().await = Some(prefs.clone());
        prefs
    }

    /// Persist preferences. Failures are logged and swallowed.
    pub async fn save(&self, prefs: &Preferences) {
        match self.write(prefs).await {
            Ok(()) => {
                debug!("Saved preferences to {}", self.path.display());
                *self.loaded.lock().await = Some(prefs.clone());
            }
            Err(e) => warn!("Could not save preferences to {}: {}", self.path.display(), e),
        }
    }

    /// Persist only when `prefs` differs from what was last loaded or saved
    pub async fn save_if_changed(&self, prefs: &Preferences) {
        let unchanged = self.loaded.lock().await.as_ref() == Some(prefs);
        if !unchanged {
            self.save(prefs).await;
        }
    }

    async fn write(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Options of a single run, immutable while it executes
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_directory: PathBuf,
    pub allow_overwrite: bool,
    pub keep_history: bool,
}

impl RunOptions {
    pub fn new(output_directory: PathBuf) -> Self {
        Self {
            output_directory,
            allow_overwrite: false,
            keep_history: true,
        }
    }

    /// Run options seeded from the stored preferences
    pub fn from_preferences(output_directory: PathBuf, prefs: &Preferences) -> Self {
        Self {
            output_directory,
            allow_overwrite: prefs.allow_overwrite,
            keep_history: prefs.keep_history,
        }
    }

    /// Validate the output directory: it must exist, be a directory and be writable
    pub fn validate(&self) -> Result<(), StripError> {
        let dir = &self.output_directory;
        let fail = |reason: &str| StripError::OutputDirectory {
            path: dir.clone(),
            reason: reason.to_string(),
        };

        if !dir.exists() {
            return Err(fail("does not exist"));
        }
        if !dir.is_dir() {
            return Err(fail("is not a directory"));
        }
        tempfile::NamedTempFile::new_in(dir)
            .map(drop)
            .map_err(|e| fail(&format!("is not writable: {}", e)))
    }
}
