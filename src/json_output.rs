//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per i chiamanti programmatici.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout (`--json`)
//! - Utilizza le strutture esistenti di `FileReport` e `RunSummary`
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio della run
//! - `file_complete`: Fine elaborazione di un file
//! - `complete`: Fine della run con il riepilogo
//! - `error`: Errore che ha impedito la run

use crate::progress::{FileReport, RunSummary};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio della run
    Start {
        total_files: usize,
        output_dir: PathBuf,
        allow_overwrite: bool,
        keep_history: bool,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        index: usize,
        total: usize,
        source_path: PathBuf,
        output_path: PathBuf,
        status: &'static str,
        reason: Option<String>,
    },

    /// Run completata
    Complete {
        total: usize,
        processed: usize,
        skipped: usize,
        status_message: String,
    },

    /// Errore generale
    Error { message: String },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn file_complete(index: usize, total: usize, report: &FileReport) -> Self {
        Self::FileComplete {
            index,
            total,
            source_path: report.source_path.clone(),
            output_path: report.output_path.clone(),
            status: report.outcome.status(),
            reason: report.outcome.reason().map(str::to_string),
        }
    }

    pub fn complete(summary: &RunSummary) -> Self {
        Self::Complete {
            total: summary.total,
            processed: summary.processed,
            skipped: summary.skipped,
            status_message: summary.status.clone(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
