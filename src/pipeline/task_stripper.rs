//! # Task Stripper Module
//!
//! Worker per lo stripping di un singolo file.
//! Separato dall'orchestratore principale per maggiore modularità.
//!
//! ## Ciclo di vita di un file:
//! `Pending → Classified → Resolved → Stripped → Logged`
//!
//! ## Scrittura a stadi:
//! Ogni strategia scrive in un file temporaneo nella directory di output
//! (stessa estensione del file finale). Solo in caso di successo il file
//! temporaneo viene spostato sul path risolto; in caso di errore viene
//! eliminato e sul disco non resta nessun output parziale.

use crate::{
    config::RunOptions,
    error::{truncate_diagnostic, StripError},
    file_manager::{FileManager, FileQueue, MediaKind},
    history::ProcessOutcome,
    pipeline::path_resolver::PathResolver,
    progress::FileReport,
    strategy::{Strategy, StrategyChain},
    video_processor::VideoProcessor,
};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const STAGING_PREFIX: &str = ".metastrip-";

/// Worker per elaborazione dei singoli file
pub struct TaskStripper<'a> {
    options: &'a RunOptions,
    video_processor: &'a VideoProcessor,
    queue: &'a FileQueue,
}

impl<'a> TaskStripper<'a> {
    pub fn new(options: &'a RunOptions, video_processor: &'a VideoProcessor, queue: &'a FileQueue) -> Self {
        Self {
            options,
            video_processor,
            queue,
        }
    }

    /// Calcola path di output atteso (delegato a PathResolver).
    /// Senza overwrite nessun file in coda può diventare una destinazione.
    pub fn expected_output_path(&self, input_path: &Path) -> PathBuf {
        PathResolver::resolve_avoiding(
            input_path,
            &self.options.output_directory,
            self.options.allow_overwrite,
            |candidate| self.queue.contains(candidate),
        )
    }

    /// Processa un singolo file. Non fallisce mai: ogni errore diventa un `SkippedError`.
    pub async fn process_single_file(&self, input_path: &Path) -> FileReport {
        let kind = FileManager::classify(input_path);
        let output_path = self.expected_output_path(input_path);
        debug!(
            "Processing {} ({}) -> {}",
            input_path.display(),
            kind.label(),
            output_path.display()
        );

        if output_path.exists() {
            if output_path == input_path {
                warn!("Overwriting original file: {}", input_path.display());
            } else {
                warn!("Replacing existing file: {}", output_path.display());
            }
        }

        let outcome = self.strip(kind, input_path, &output_path).await;
        FileReport {
            source_path: input_path.to_path_buf(),
            output_path,
            outcome,
        }
    }

    async fn strip(&self, kind: MediaKind, input_path: &Path, output_path: &Path) -> ProcessOutcome {
        // Nessun transcoder: il video viene saltato senza invocazioni
        if kind == MediaKind::Video && !self.video_processor.is_available() {
            debug!("Skipping video, no transcoder: {}", input_path.display());
            return ProcessOutcome::SkippedNoTranscoder;
        }

        let chain = StrategyChain::for_kind(kind);
        match self.strip_staged(&chain, input_path, output_path).await {
            Ok(strategy) => {
                debug!("✅ {} stripped with {}", input_path.display(), strategy.name());
                if kind == MediaKind::Passthrough {
                    ProcessOutcome::CopiedNoStrip
                } else {
                    ProcessOutcome::Success
                }
            }
            Err(StripError::TranscoderAbsent) => ProcessOutcome::SkippedNoTranscoder,
            Err(e) => {
                warn!("Skipping {}: {}", input_path.display(), e);
                ProcessOutcome::SkippedError(truncate_diagnostic(&Self::diagnostic(&e)))
            }
        }
    }

    /// Esegue la catena su un file temporaneo e lo sposta sul path finale
    async fn strip_staged(
        &self,
        chain: &StrategyChain,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<Strategy, StripError> {
        let staged = Self::staging_file(output_path)?;
        let strategy = chain.run(input_path, &staged, self.video_processor).await?;

        // Best effort: il file finale mantiene i permessi dell'originale
        if let Ok(metadata) = tokio::fs::metadata(input_path).await {
            if let Err(e) = tokio::fs::set_permissions(&staged, metadata.permissions()).await {
                debug!("Could not copy permissions to {}: {}", output_path.display(), e);
            }
        }

        staged.persist(output_path).map_err(|e| StripError::Io(e.error))?;
        Ok(strategy)
    }

    fn staging_file(output_path: &Path) -> Result<TempPath, StripError> {
        let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        let suffix = output_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)?;
        Ok(file.into_temp_path())
    }

    /// Messaggio mostrato all'utente: la diagnostica FFmpeg è già leggibile così com'è
    fn diagnostic(error: &StripError) -> String {
        match error {
            StripError::Transcoder(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_processor::DEFAULT_TRANSCODE_TIMEOUT;
    use tempfile::TempDir;

    fn leftover_staging_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count()
    }

    #[tokio::test]
    async fn test_passthrough_is_copied() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = src.path().join("c.xyz");
        std::fs::write(&input, b"opaque bytes").unwrap();

        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(report.outcome, ProcessOutcome::CopiedNoStrip);
        assert_eq!(report.output_path, out.path().join("c.xyz"));
        assert_eq!(std::fs::read(&report.output_path).unwrap(), b"opaque bytes");
        assert_eq!(leftover_staging_files(out.path()), 0);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_partial_output() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = src.path().join("broken.png");
        std::fs::write(&input, b"not a png at all").unwrap();

        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert!(matches!(report.outcome, ProcessOutcome::SkippedError(_)));
        assert!(!report.output_path.exists());
        assert_eq!(leftover_staging_files(out.path()), 0);
    }

    #[tokio::test]
    async fn test_image_fallback_counts_as_success() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let input = src.path().join("mislabeled.jpg");
        image::RgbImage::from_pixel(5, 5, image::Rgb([90, 90, 200]))
            .save_with_format(&input, image::ImageFormat::Png)
            .unwrap();

        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(report.outcome, ProcessOutcome::Success);
        let written = std::fs::read(out.path().join("mislabeled.jpg")).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_video_without_transcoder_is_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("b.mp4");
        std::fs::write(&input, b"video").unwrap();

        let out = TempDir::new().unwrap();
        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(report.outcome, ProcessOutcome::SkippedNoTranscoder);
        assert!(!report.output_path.exists());
    }

    #[tokio::test]
    async fn test_overwrite_in_place() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.jpg");
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30])).save(&input).unwrap();

        let mut options = RunOptions::new(dir.path().to_path_buf());
        options.allow_overwrite = true;
        let video = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(report.outcome, ProcessOutcome::Success);
        assert_eq!(report.output_path, input);
        assert!(image::open(&input).is_ok());
        assert_eq!(leftover_staging_files(dir.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_video_fallback_to_compat_profile() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        // Fails unless invoked with the compat flags (-f mp4)
        let tool = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &tool,
            "#!/bin/sh\ncase \"$*\" in *\"-f mp4\"*) for last; do :; done; cp \"$2\" \"$last\";; *) echo 'moov atom not found' >&2; exit 1;; esac\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("clip.mov");
        std::fs::write(&input, b"movie").unwrap();

        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(Some(tool), DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(report.outcome, ProcessOutcome::Success);
        assert_eq!(std::fs::read(out.path().join("clip.mov")).unwrap(), b"movie");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcoder_diagnostic_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let tool = dir.path().join("fake-ffmpeg");
        std::fs::write(&tool, "#!/bin/sh\necho 'Invalid data found when processing input' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("clip.mkv");
        std::fs::write(&input, b"movie").unwrap();

        let options = RunOptions::new(out.path().to_path_buf());
        let video = VideoProcessor::new(Some(tool), DEFAULT_TRANSCODE_TIMEOUT);
        let report = TaskStripper::new(&options, &video, &FileQueue::new()).process_single_file(&input).await;

        assert_eq!(
            report.outcome,
            ProcessOutcome::SkippedError("The video file appears to be corrupt or in an unsupported format.".into())
        );
    }
}
