//! # Metastrip Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Preferenze persistenti e opzioni della run
//! - `error`: Tipi di errore custom della pipeline
//! - `history`: Storico degli esiti, persistito tra le run
//! - `file_manager`: Classificazione dei file e coda di input
//! - `strategy`: Catene di strategie con fallback per tipo di media
//! - `image_processor`: Stripping metadata immagini (JPEG/PNG/GIF/BMP/TIFF)
//! - `video_processor`: Stripping metadata video tramite FFmpeg (MP4/MOV/AVI/MKV)
//! - `tool_resolver`: Ricerca dell'eseguibile FFmpeg
//! - `pipeline`: Orchestratore principale del processo
//! - `progress` / `json_output`: Progress reporting e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use metastrip::{BatchStripper, FileQueue, HistoryLedger, RunOptions, VideoProcessor};
//!
//! let mut queue = FileQueue::new();
//! queue.add_path(&path)?;
//! let mut stripper = BatchStripper::new(HistoryLedger::in_memory(500), VideoProcessor::new(None, timeout));
//! let summary = stripper.run_batch(&queue, &RunOptions::new(out_dir), &mut |_, _, _: &str| {}).await?;
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod file_manager;
pub mod strategy;
pub mod image_processor;
pub mod video_processor;
pub mod tool_resolver;
pub mod pipeline;
pub mod progress;
pub mod json_output;

pub use config::{PreferenceStore, Preferences, RunOptions};
pub use error::StripError;
pub use file_manager::{FileManager, FileQueue, MediaKind};
pub use history::{HistoryEntry, HistoryLedger, ProcessOutcome};
pub use pipeline::BatchStripper;
pub use progress::{FileReport, ProgressReporter, RunSummary};
pub use video_processor::VideoProcessor;
