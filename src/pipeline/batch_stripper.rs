//! # Batch Stripper Main Orchestrator
//!
//! Orchestratore principale che possiede la run e delega il lavoro sui
//! singoli file a `TaskStripper`.
//!
//! ## Responsabilità:
//! - Verifica le precondizioni prima di toccare qualsiasi file
//!   (coda non vuota, directory di output esistente e scrivibile, nessuna run attiva)
//! - Processa i file uno alla volta, nell'ordine della coda
//! - Registra ogni esito nella history e la salva una sola volta a fine run
//! - Invoca il `ProgressReporter` dopo ogni file
//! - Si ferma tra un file e l'altro quando riceve il segnale di stop
//!
//! ## Stati della run:
//! `Idle → Running → Completed`
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut stripper = BatchStripper::new(ledger, VideoProcessor::new(ffmpeg, DEFAULT_TRANSCODE_TIMEOUT));
//! let summary = stripper
//!     .run_batch(&queue, &options, &mut |done, total, name: &str| println!("{done}/{total} {name}"))
//!     .await?;
//! println!("{}", summary.status);
//! ```

use crate::{
    config::RunOptions,
    error::StripError,
    file_manager::FileQueue,
    history::{HistoryEntry, HistoryLedger, ProcessOutcome},
    pipeline::task_stripper::TaskStripper,
    progress::{FileReport, ProgressReporter, RunStats, RunSummary},
    video_processor::VideoProcessor,
};
use std::path::Path;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Reason attached to the files a halted run never started
pub const HALTED_REASON: &str = "run halted before this file was started";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Orchestratore principale
pub struct BatchStripper {
    ledger: HistoryLedger,
    video_processor: VideoProcessor,
    state: RunState,
    stop_signal: Option<broadcast::Receiver<()>>,
}

impl BatchStripper {
    pub fn new(ledger: HistoryLedger, video_processor: VideoProcessor) -> Self {
        Self {
            ledger,
            video_processor,
            state: RunState::Idle,
            stop_signal: None,
        }
    }

    /// Accept a stop signal, checked between files only
    pub fn with_stop_signal(mut self, stop_signal: broadcast::Receiver<()>) -> Self {
        self.stop_signal = Some(stop_signal);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn video_processor(&self) -> &VideoProcessor {
        &self.video_processor
    }

    /// Esegue la run completa sui file in coda
    pub async fn run_batch(
        &mut self,
        queue: &FileQueue,
        options: &RunOptions,
        reporter: &mut impl ProgressReporter,
    ) -> Result<RunSummary, StripError> {
        if self.state == RunState::Running {
            return Err(StripError::AlreadyRunning);
        }
        if queue.is_empty() {
            return Err(StripError::EmptyQueue);
        }
        options.validate()?;

        self.state = RunState::Running;
        self.ledger.set_enabled(options.keep_history);
        self.log_configuration(queue, options);

        let total = queue.len();
        let mut stats = RunStats::new(total);
        let mut halted = false;

        let worker = TaskStripper::new(options, &self.video_processor, queue);
        for input_path in queue.iter() {
            if !halted && Self::stop_requested(&mut self.stop_signal) {
                info!("⏹️ Stop requested, remaining files will not be started");
                halted = true;
            }

            let report = if halted {
                Self::not_started(&worker, input_path)
            } else {
                let report = worker.process_single_file(input_path).await;
                self.ledger.record(HistoryEntry::new(
                    report.source_path.clone(),
                    report.output_path.clone(),
                    report.outcome.clone(),
                ));
                report
            };

            stats.add(report.clone());
            reporter.file_finished(stats.completed(), total, &report);
        }

        if let Err(e) = self.ledger.flush().await {
            warn!("Could not save history to {}: {}", self.ledger.path().display(), e);
        }

        let summary = stats.into_summary();
        info!("✅ {}", summary.status);
        reporter.run_finished(&summary);

        self.state = RunState::Completed;
        Ok(summary)
    }

    fn log_configuration(&self, queue: &FileQueue, options: &RunOptions) {
        info!(
            "Starting metadata stripping: {} files -> {}",
            queue.len(),
            options.output_directory.display()
        );
        if options.allow_overwrite {
            info!("Overwrite mode: originals in the output directory will be replaced");
        }
        if !options.keep_history {
            debug!("History disabled for this run");
        }
        if !self.video_processor.is_available() {
            debug!("No transcoder available, videos will be skipped");
        }
    }

    fn stop_requested(stop_signal: &mut Option<broadcast::Receiver<()>>) -> bool {
        match stop_signal {
            Some(receiver) => match receiver.try_recv() {
                Ok(()) | Err(TryRecvError::Lagged(_)) => true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
            },
            None => false,
        }
    }

    fn not_started(worker: &TaskStripper<'_>, input_path: &Path) -> FileReport {
        FileReport {
            source_path: input_path.to_path_buf(),
            output_path: worker.expected_output_path(input_path),
            outcome: ProcessOutcome::SkippedError(HALTED_REASON.to_string()),
        }
    }
}
