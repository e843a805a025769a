//! # Progress Tracking Module
//!
//! Unifica progress bar e output JSON in un singolo reporter usato dalla CLI.
//! Gestisce sia l'output JSON che la progress bar tradizionale.

use crate::{
    json_output::JsonMessage,
    progress::{FileReport, ProgressManager, ProgressReporter, RunSummary},
};

/// Reporter unificato: progress bar in modalità interattiva, eventi JSON con `--json`
pub struct ProgressTracker {
    pub total_files: usize,
    json_output: bool,
    progress_manager: Option<ProgressManager>,
}

impl ProgressTracker {
    /// Crea un nuovo tracker
    pub fn new(total_files: usize, json_output: bool) -> Self {
        // Niente progress bar in modalità JSON: stdout deve restare parsabile
        let progress_manager = (!json_output).then(|| ProgressManager::new(total_files as u64));
        Self {
            total_files,
            json_output,
            progress_manager,
        }
    }

    /// Messaggio mostrato accanto alla barra per un file completato
    fn status_line(report: &FileReport) -> String {
        let name = report.file_name();
        match report.outcome.reason() {
            Some(reason) => format!("[SKIP] {}: {}", name, reason),
            None if report.outcome.is_processed() => format!("[OK] {}", name),
            None => format!("[SKIP] {}: FFmpeg not installed", name),
        }
    }
}

impl ProgressReporter for ProgressTracker {
    fn file_finished(&mut self, completed: usize, total: usize, report: &FileReport) {
        if self.json_output {
            JsonMessage::file_complete(completed, total, report).emit();
        }
        if let Some(manager) = &self.progress_manager {
            manager.update(completed as u64, &Self::status_line(report));
        }
    }

    fn run_finished(&mut self, summary: &RunSummary) {
        if self.json_output {
            JsonMessage::complete(summary).emit();
        }
        if let Some(manager) = &self.progress_manager {
            manager.finish(&summary.status);
        }
    }
}
