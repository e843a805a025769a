//! # Stripping Strategies Module
//!
//! Ogni tipo di media ha una lista ordinata di strategie: si provano in
//! sequenza, la prima che riesce vince, e se falliscono tutte viene riportata
//! la diagnostica dell'ultima.
//!
//! | Tipo        | Strategie                                   |
//! |-------------|---------------------------------------------|
//! | Image       | `MetadataClear` (solo JPEG), `PixelReencode` |
//! | Video       | `Transcode(Full)`, `Transcode(Compat)` (solo MP4/MOV) |
//! | Passthrough | `Copy`                                      |
//!
//! Contratto comune: `(input, output) -> Result<(), StripError>`.
//! Un transcoder assente interrompe subito la catena, senza invocazioni.

use crate::error::StripError;
use crate::file_manager::{FileManager, MediaKind};
use crate::image_processor::ImageProcessor;
use crate::video_processor::{TranscodeProfile, VideoProcessor};
use std::path::Path;
use tracing::{debug, warn};

/// A single way of producing a metadata-free copy of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Drop metadata segments from the JPEG marker stream, keep the scan data untouched
    MetadataClear,
    /// Decode and re-encode the pixels; encoders write no auxiliary metadata
    PixelReencode,
    /// Remux through the external transcoder
    Transcode(TranscodeProfile),
    /// Byte-for-byte copy, no metadata work at all
    Copy,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MetadataClear => "metadata-clear",
            Self::PixelReencode => "pixel-reencode",
            Self::Transcode(TranscodeProfile::Full) => "transcode",
            Self::Transcode(TranscodeProfile::Compat) => "transcode-compat",
            Self::Copy => "copy",
        }
    }

    /// Whether this strategy should be attempted for the given input
    pub fn applies_to(&self, input: &Path) -> bool {
        match self {
            Self::MetadataClear => ImageProcessor::is_jpeg(input),
            Self::Transcode(profile) => profile.applies_to(input),
            Self::PixelReencode | Self::Copy => true,
        }
    }

    pub async fn strip(&self, input: &Path, output: &Path, video: &VideoProcessor) -> Result<(), StripError> {
        match self {
            Self::MetadataClear => ImageProcessor::clear_metadata_tables(input, output).await,
            Self::PixelReencode => ImageProcessor::reencode_pixels(input, output).await,
            Self::Transcode(profile) => video.transcode(input, output, *profile).await,
            Self::Copy => {
                tokio::fs::copy(input, output).await?;
                Ok(())
            }
        }
    }
}

/// Ordered list of strategies for one media kind
#[derive(Debug, Clone)]
pub struct StrategyChain {
    kind: MediaKind,
    strategies: Vec<Strategy>,
}

impl StrategyChain {
    pub fn for_kind(kind: MediaKind) -> Self {
        let strategies = match kind {
            MediaKind::Image => vec![Strategy::MetadataClear, Strategy::PixelReencode],
            MediaKind::Video => vec![
                Strategy::Transcode(TranscodeProfile::Full),
                Strategy::Transcode(TranscodeProfile::Compat),
            ],
            MediaKind::Passthrough => vec![Strategy::Copy],
        };
        Self { kind, strategies }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Strategie applicabili a un file specifico, nell'ordine in cui verranno provate
    pub fn applicable(&self, input: &Path) -> Vec<Strategy> {
        self.strategies
            .iter()
            .copied()
            .filter(|s| s.applies_to(input))
            .collect()
    }

    /// Prova le strategie in ordine. Ritorna quella riuscita, oppure l'ultimo errore.
    pub async fn run(&self, input: &Path, output: &Path, video: &VideoProcessor) -> Result<Strategy, StripError> {
        let mut last_error = None;

        for strategy in self.applicable(input) {
            debug!("Trying {} on {}", strategy.name(), input.display());
            match strategy.strip(input, output, video).await {
                Ok(()) => {
                    if last_error.is_some() {
                        debug!("Fallback {} succeeded for {}", strategy.name(), input.display());
                    }
                    return Ok(strategy);
                }
                Err(StripError::TranscoderAbsent) => return Err(StripError::TranscoderAbsent),
                Err(e) => {
                    warn!("{} failed for {}: {}", strategy.name(), input.display(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StripError::InvalidImage(format!(
                "no {} strategy applies to {}",
                self.kind.label(),
                FileManager::extension_of(input).unwrap_or_default()
            ))
        }))
    }
}
