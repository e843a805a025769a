//! # Path Resolution Module
//!
//! Centralizza la logica di calcolo del path di output.
//!
//! - Overwrite permesso: `output_dir/<nome originale>`.
//! - Directory diverse: `output_dir/<nome originale>`, anche se esiste già un
//!   file con lo stesso nome (vince l'ultima scrittura), a meno che quel file
//!   sia a sua volta un sorgente in coda.
//! - Stessa directory senza overwrite (o nome occupato da un sorgente in coda):
//!   `<stem>_clean.<ext>`, poi `_clean_1`,
//!   `_clean_2`, ... finché non si trova un nome libero. L'esistenza viene
//!   ricontrollata sul filesystem a ogni chiamata.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

const CLEAN_SUFFIX: &str = "_clean";

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Calcola il path di output per un file dato
    pub fn resolve(input_path: &Path, output_dir: &Path, allow_overwrite: bool) -> PathBuf {
        Self::resolve_avoiding(input_path, output_dir, allow_overwrite, |_| false)
    }

    /// Come `resolve`, ma senza overwrite non restituisce mai un path per cui
    /// `is_source` è vero: un originale in coda non viene mai sostituito.
    pub fn resolve_avoiding(
        input_path: &Path,
        output_dir: &Path,
        allow_overwrite: bool,
        is_source: impl Fn(&Path) -> bool,
    ) -> PathBuf {
        let file_name = input_path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("output"));

        if allow_overwrite {
            let result = output_dir.join(&file_name);
            debug!("Resolved output path: {} -> {}", input_path.display(), result.display());
            return result;
        }

        if !Self::same_directory(input_path, output_dir) {
            let result = output_dir.join(&file_name);
            if !is_source(&result) {
                debug!("Resolved output path: {} -> {}", input_path.display(), result.display());
                return result;
            }
            debug!("{} is a queued source, using a _clean name", result.display());
        }

        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let extension = input_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = output_dir.join(format!("{stem}{CLEAN_SUFFIX}{extension}"));
        let mut counter: u64 = 1;
        while candidate.exists() || is_source(&candidate) {
            candidate = output_dir.join(format!("{stem}{CLEAN_SUFFIX}_{counter}{extension}"));
            counter += 1;
        }

        debug!("Resolved collision-safe output path: {} -> {}", input_path.display(), candidate.display());
        candidate
    }

    /// Confronta la directory del file con quella di output (canonicalizzate se possibile)
    pub fn same_directory(input_path: &Path, output_dir: &Path) -> bool {
        let parent = match input_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
        let canonical_output = output_dir.canonicalize().unwrap_or_else(|_| output_dir.to_path_buf());
        canonical_parent == canonical_output
    }
}
