//! # Metastrip - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento delle preferenze e applicazione degli override da CLI
//! - Costruzione della coda di file e avvio della pipeline
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, overwrite, history, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, WARN in modalità JSON)
//! 3. Carica preferenze e history dalla state directory (`~/.metastrip`)
//! 4. Gestisce i comandi di history (`--clear-history`, `--show-history`)
//! 5. Avvia la run su un task tokio, con Ctrl-C come segnale di stop
//! 6. Salva le preferenze modificate
//!
//! ## Esempio di utilizzo:
//! ```bash
//! metastrip ~/Pictures/trip --output ~/Pictures/clean --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use metastrip::{
    config::{default_state_dir, PREFERENCES_FILE_NAME},
    history::HISTORY_FILE_NAME,
    json_output::JsonMessage,
    pipeline::ProgressTracker,
    tool_resolver::ToolPathResolver,
    video_processor::DEFAULT_TRANSCODE_TIMEOUT,
    BatchStripper, FileManager, FileQueue, HistoryLedger, MediaKind, PreferenceStore, Preferences,
    RunOptions, VideoProcessor,
};

#[derive(Parser)]
#[command(name = "metastrip")]
#[command(about = "Remove EXIF and container metadata from images and videos")]
struct Args {
    /// Files or folders to strip (folders are scanned recursively for media)
    inputs: Vec<PathBuf>,

    /// Output directory (defaults to the last one used)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Allow replacing originals when the output directory is the source directory
    #[arg(long, conflicts_with = "no_overwrite")]
    allow_overwrite: bool,

    /// Never replace originals, write `_clean` copies instead
    #[arg(long)]
    no_overwrite: bool,

    /// Do not record this run in the history
    #[arg(long)]
    no_history: bool,

    /// Delete the stored history
    #[arg(long)]
    clear_history: bool,

    /// Print the N most recent history entries
    #[arg(long, value_name = "N")]
    show_history: Option<usize>,

    /// Path to the ffmpeg executable
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Store the options of this invocation as the new defaults
    #[arg(long)]
    save_preferences: bool,

    /// Directory holding preferences and history (default: ~/.metastrip)
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Emit JSON events on stdout instead of a progress bar
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Preferences with the command-line overrides applied
    fn apply_overrides(&self, prefs: &Preferences) -> Preferences {
        let mut effective = prefs.clone();
        if self.allow_overwrite {
            effective.allow_overwrite = true;
        }
        if self.no_overwrite {
            effective.allow_overwrite = false;
        }
        if self.no_history {
            effective.keep_history = false;
        }
        if let Some(ref ffmpeg) = self.ffmpeg {
            effective.transcoder_path = Some(ffmpeg.clone());
        }
        effective
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr, stdout is reserved for JSON events)
    let default_level = if args.verbose {
        "debug"
    } else if args.json {
        "warn"
    } else {
        "info"
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let result = run(&args).await;
    if let Err(ref e) = result {
        if args.json {
            JsonMessage::error(format!("{:#}", e)).emit();
        }
    }
    result
}

async fn run(args: &Args) -> Result<()> {
    let state_dir = match args.state_dir.clone().or_else(default_state_dir) {
        Some(dir) => dir,
        None => anyhow::bail!("Could not determine the home directory, pass --state-dir"),
    };

    let store = PreferenceStore::new(state_dir.join(PREFERENCES_FILE_NAME));
    let stored = store.load().await;
    let effective = args.apply_overrides(&stored);
    let mut to_save = if args.save_preferences {
        effective.clone()
    } else {
        stored.clone()
    };

    let mut ledger = HistoryLedger::load(state_dir.join(HISTORY_FILE_NAME), effective.max_history_entries).await;

    if args.clear_history {
        ledger
            .clear()
            .await
            .with_context(|| format!("Failed to clear history at {}", ledger.path().display()))?;
        info!("History cleared");
    }

    if let Some(count) = args.show_history {
        print_history(&ledger, count, args.json);
    }

    if args.inputs.is_empty() {
        if args.clear_history || args.show_history.is_some() {
            store.save_if_changed(&to_save).await;
            return Ok(());
        }
        anyhow::bail!("No input files given");
    }

    // Build the queue
    let mut queue = FileQueue::new();
    for input in &args.inputs {
        if !input.exists() {
            warn!("Input does not exist, ignoring: {}", input.display());
            continue;
        }
        queue
            .add_path(input)
            .with_context(|| format!("Failed to queue {}", input.display()))?;
    }

    let output_dir = match args.output.clone().or_else(|| effective.last_output_dir.clone()) {
        Some(dir) => dir,
        None => anyhow::bail!("No output directory given, pass --output"),
    };
    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir)?;
        info!("Created output directory: {}", output_dir.display());
    }

    let options = RunOptions::from_preferences(output_dir.clone(), &effective);
    let transcoder = ToolPathResolver::new(effective.transcoder_path.clone()).resolve_transcoder();
    print_startup_warnings(&queue, &options, &effective, transcoder.is_some());

    if args.json {
        JsonMessage::Start {
            total_files: queue.len(),
            output_dir: output_dir.clone(),
            allow_overwrite: options.allow_overwrite,
            keep_history: options.keep_history,
        }
        .emit();
    }

    // Ctrl-C ferma la run tra un file e l'altro
    let (stop_tx, stop_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current file");
            let _ = stop_tx.send(());
        }
    });

    let mut stripper = BatchStripper::new(ledger, VideoProcessor::new(transcoder, DEFAULT_TRANSCODE_TIMEOUT))
        .with_stop_signal(stop_rx);
    let json = args.json;
    let run_options = options.clone();
    let summary = tokio::spawn(async move {
        let mut tracker = ProgressTracker::new(queue.len(), json);
        stripper.run_batch(&queue, &run_options, &mut tracker).await
    })
    .await??;

    to_save.last_output_dir = Some(output_dir);
    store.save_if_changed(&to_save).await;

    if !json && summary.skipped > 0 {
        for report in summary.reports.iter().filter(|r| !r.outcome.is_processed()) {
            info!(
                "  • {}: {}",
                report.file_name(),
                report.outcome.reason().unwrap_or("FFmpeg not installed")
            );
        }
    }

    Ok(())
}

fn print_startup_warnings(queue: &FileQueue, options: &RunOptions, prefs: &Preferences, has_transcoder: bool) {
    let has_videos = queue.iter().any(|p| FileManager::classify(p) == MediaKind::Video);
    if has_videos && !has_transcoder && !prefs.suppress_no_transcoder_warning {
        warn!(
            "FFmpeg not found: videos will be skipped. Install it with: {}",
            ToolPathResolver::install_instructions()
        );
    }
    if options.allow_overwrite && !prefs.suppress_overwrite_warning {
        warn!("Overwrite enabled: originals in {} may be replaced", options.output_directory.display());
    }
}

fn print_history(ledger: &HistoryLedger, count: usize, json: bool) {
    if ledger.is_empty() && !json {
        println!("History is empty");
        return;
    }
    for entry in ledger.recent(count) {
        if json {
            if let Ok(line) = serde_json::to_string(entry) {
                println!("{}", line);
            }
        } else {
            let reason = entry.outcome.reason().map(|r| format!(" ({})", r)).unwrap_or_default();
            println!(
                "{} {} -> {} [{}{}]",
                entry.timestamp,
                entry.source_path.display(),
                entry.output_path.display(),
                entry.outcome.status(),
                reason
            );
        }
    }
}
