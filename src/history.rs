//! # History Ledger Module
//!
//! Questo modulo gestisce lo storico dei file processati tra una run e l'altra.
//!
//! ## Responsabilità:
//! - Registra l'esito di ogni file (`record`), solo se la history è abilitata
//! - Mantiene al massimo N entry, eliminando le più vecchie (FIFO)
//! - Persiste la lista completa una sola volta a fine batch (`flush`)
//! - Cancella memoria e file su richiesta (`clear`)
//!
//! ## Strategia di persistence:
//! - Un unico file JSON, di default `~/.metastrip/history.json`
//! - Caricamento best-effort: file illeggibile o corrotto ⇒ ledger vuoto,
//!   entry singole malformate vengono scartate
//!
//! ## Esempio struttura history file:
//! ```json
//! [
//!   {
//!     "timestamp": 1760601600,
//!     "source_path": "/photos/a.jpg",
//!     "output_path": "/clean/a.jpg",
//!     "outcome": { "status": "success" }
//!   },
//!   {
//!     "timestamp": 1760601601,
//!     "source_path": "/photos/b.mp4",
//!     "output_path": "/clean/b.mp4",
//!     "outcome": { "status": "skipped_error", "reason": "FFmpeg could not find the input file." }
//!   }
//! ]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

/// File name of the ledger inside the state directory
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Default ledger bound
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Result of processing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Metadata actually removed
    Success,
    /// Video skipped because no transcoder is installed
    SkippedNoTranscoder,
    /// Every strategy failed; carries the (truncated) diagnostic
    SkippedError(String),
    /// Unrecognized type copied as-is, no metadata work attempted
    CopiedNoStrip,
}

impl ProcessOutcome {
    /// Counted in `RunSummary::processed` (otherwise in `skipped`)
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Success | Self::CopiedNoStrip)
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SkippedNoTranscoder => "skipped_no_transcoder",
            Self::SkippedError(_) => "skipped_error",
            Self::CopiedNoStrip => "copied_no_strip",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::SkippedError(reason) => Some(reason),
            _ => None,
        }
    }
}

/// One processed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: u64,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub outcome: ProcessOutcome,
}

impl HistoryEntry {
    pub fn new(source_path: PathBuf, output_path: PathBuf, outcome: ProcessOutcome) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            timestamp,
            source_path,
            output_path,
            outcome,
        }
    }
}

/// Append-only, size-bounded record of processed files
#[derive(Debug)]
pub struct HistoryLedger {
    path: PathBuf,
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
    enabled: bool,
}

impl HistoryLedger {
    /// Load the ledger from `path`. Never fails: unreadable data yields an empty ledger.
    pub async fn load(path: PathBuf, max_entries: usize) -> Self {
        let entries = match fs::read_to_string(&path).await {
            Ok(content) => Self::parse_entries(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => {
                warn!("Could not read history file {}: {}", path.display(), e);
                VecDeque::new()
            }
        };

        let mut ledger = Self {
            path,
            entries,
            max_entries,
            enabled: true,
        };
        ledger.enforce_bound();
        debug!("Loaded {} history entries", ledger.entries.len());
        ledger
    }

    /// In-memory ledger that is never persisted anywhere useful (tests, dry runs)
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            path: PathBuf::new(),
            entries: VecDeque::new(),
            max_entries,
            enabled: true,
        }
    }

    fn parse_entries(content: &str) -> VecDeque<HistoryEntry> {
        let raw: Vec<serde_json::Value> = match serde_json::from_str(content) {
            Ok(values) => values,
            Err(e) => {
                warn!("History file is corrupt, starting empty: {}", e);
                return VecDeque::new();
            }
        };

        let total = raw.len();
        let entries: VecDeque<HistoryEntry> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if entries.len() < total {
            warn!("Dropped {} malformed history entries", total - entries.len());
        }
        entries
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry (no-op when history is disabled)
    pub fn record(&mut self, entry: HistoryEntry) {
        if !self.enabled {
            return;
        }
        self.entries.push_back(entry);
        self.enforce_bound();
    }

    /// Persist the full list, truncated to the bound. No-op when history is disabled.
    pub async fn flush(&mut self) -> Result<()> {
        if !self.enabled || self.path.as_os_str().is_empty() {
            return Ok(());
        }
        self.enforce_bound();
        self.write().await?;
        debug!("Saved {} history entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// Empty memory and disk, regardless of the enabled flag
    pub async fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The `count` most recent entries, newest last
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enforce_bound(&mut self) {
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    async fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}
