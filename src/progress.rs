//! # Progress Tracking and Statistics Module
//!
//! Questo modulo definisce l'interfaccia di progresso della pipeline e le
//! statistiche di una run.
//!
//! ## Componenti principali:
//! - `ProgressReporter`: Callback invocato dopo ogni file (implementato
//!   anche per qualsiasi closure `FnMut(completed, total, file_name)`)
//! - `ProgressManager`: Progress bar `indicatif` per l'uso interattivo
//! - `RunStats`: Contatori cumulativi durante la run
//! - `RunSummary`: Riepilogo finale, calcolato una sola volta a fine run
//!
//! ## Conteggi:
//! - **processed**: `Success` + `CopiedNoStrip`
//! - **skipped**: `SkippedNoTranscoder` + `SkippedError`
//! - Invariante: `processed + skipped == total`
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================================] 12/12 (100%) [OK] photo.jpg
//! ```

use crate::history::ProcessOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// What happened to one file of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub outcome: ProcessOutcome,
}

impl FileReport {
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}

/// Receives progress after each file. Invoked synchronously by the worker.
pub trait ProgressReporter {
    fn file_finished(&mut self, completed: usize, total: usize, report: &FileReport);

    fn run_finished(&mut self, _summary: &RunSummary) {}
}

impl<F> ProgressReporter for F
where
    F: FnMut(usize, usize, &str),
{
    fn file_finished(&mut self, completed: usize, total: usize, report: &FileReport) {
        self(completed, total, &report.file_name())
    }
}

/// Manages the interactive progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Move the bar to `position` and show a message
    pub fn update(&self, position: u64, message: &str) {
        self.bar.set_position(position);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for the current run
#[derive(Debug, Default)]
pub struct RunStats {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    reports: Vec<FileReport>,
}

impl RunStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn add(&mut self, report: FileReport) {
        if report.outcome.is_processed() {
            self.processed += 1;
        } else {
            self.skipped += 1;
        }
        self.reports.push(report);
    }

    pub fn completed(&self) -> usize {
        self.processed + self.skipped
    }

    pub fn format_summary(&self) -> String {
        let mut status = format!("Completed! Processed {} of {} files.", self.processed, self.total);
        if self.skipped > 0 {
            status.push_str(&format!(" Skipped {} files.", self.skipped));
        }
        status
    }

    pub fn into_summary(self) -> RunSummary {
        RunSummary {
            status: self.format_summary(),
            total: self.total,
            processed: self.processed,
            skipped: self.skipped,
            reports: self.reports,
        }
    }
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub status: String,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.total, self.processed, self.skipped)
    }
}
