//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline di stripping.
//!
//! ## Responsabilità:
//! - Definisce `StripError` enum per categorizzare tutti gli errori possibili
//! - Separa gli errori per-file (convertiti in outcome `SkippedError`) dagli
//!   errori di precondizione (che bloccano la run prima del loop)
//! - Integra con `thiserror` per automatic error conversion
//! - Fornisce `truncate_diagnostic()` per i messaggi salvati nella history
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori di decodifica/codifica immagini
//! - `InvalidImage`: Stream JPEG non valido durante la pulizia dei segmenti
//! - `Transcoder`: FFmpeg ha fallito (diagnostica già user-facing)
//! - `TranscoderAbsent`: FFmpeg non trovato sul sistema
//! - `Timeout`: Il subprocess ha superato il limite di tempo
//! - `EmptyQueue` / `OutputDirectory` / `AlreadyRunning`: Precondizioni della run
//!
//! ## Esempio:
//! ```rust,ignore
//! if transcoder.is_none() {
//!     return Err(StripError::TranscoderAbsent);
//! }
//! ```

use std::path::PathBuf;

/// Maximum length (in characters) of a diagnostic stored in a `SkippedError` outcome
pub const MAX_DIAGNOSTIC_CHARS: usize = 240;

/// Custom error types for metadata stripping
#[derive(thiserror::Error, Debug)]
pub enum StripError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    #[error("FFmpeg error: {0}")]
    Transcoder(String),

    #[error("FFmpeg is not available on this system")]
    TranscoderAbsent,

    #[error("Video processing timed out. The file may be too large.")]
    Timeout,

    #[error("No files queued for processing")]
    EmptyQueue,

    #[error("Output directory is not usable ({path}): {reason}")]
    OutputDirectory { path: PathBuf, reason: String },

    #[error("A batch is already running")]
    AlreadyRunning,
}

/// Tronca una diagnostica a `MAX_DIAGNOSTIC_CHARS` caratteri, rispettando i char boundary
pub fn truncate_diagnostic(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(MAX_DIAGNOSTIC_CHARS) {
        Some((cut, _)) => format!("{}…", &message[..cut]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_diagnostic_untouched() {
        assert_eq!(truncate_diagnostic("  disk full \n"), "disk full");
    }

    #[test]
    fn test_long_diagnostic_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_DIAGNOSTIC_CHARS + 10);
        let truncated = truncate_diagnostic(&long);
        assert_eq!(truncated.chars().count(), MAX_DIAGNOSTIC_CHARS + 1);
        assert!(truncated.ends_with('…'));
    }
}
