//! # File Management Module
//!
//! Questo modulo gestisce la classificazione dei file e la coda di input della run.
//!
//! ## Responsabilità:
//! - Classificazione per estensione (immagine, video, passthrough)
//! - Coda ordinata di file senza duplicati (`FileQueue`)
//! - Discovery ricorsiva di file media nelle cartelle selezionate
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati riconosciuti:
//! - **Immagini**: JPG, JPEG, PNG, GIF, BMP, TIFF
//! - **Video**: MP4, MOV, AVI, MKV
//! - Tutto il resto viene copiato byte per byte (passthrough)
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut queue = FileQueue::new();
//! queue.add_path("/path/to/photos")?; // cartella: solo immagini e video
//! queue.add_path("/path/to/notes.txt")?; // file esplicito: sempre accodato
//! ```

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Kind of media, decided purely by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Passthrough,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Passthrough => "passthrough",
        }
    }
}

/// Manages file classification and discovery
pub struct FileManager;

impl FileManager {
    /// Lowercased extension of a path, if any
    pub fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Classify a path by extension. Total over any input, never touches the disk.
    pub fn classify(path: &Path) -> MediaKind {
        match Self::extension_of(path).as_deref() {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => MediaKind::Image,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => MediaKind::Video,
            _ => MediaKind::Passthrough,
        }
    }

    /// Find all image and video files below a directory
    pub fn find_media_files(media_dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(media_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| Self::classify(path) != MediaKind::Passthrough)
            .collect()
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Coda ordinata dei file da processare, senza duplicati
#[derive(Debug, Default, Clone)]
pub struct FileQueue {
    entries: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single file. Returns false when the path is already queued.
    pub fn push(&mut self, path: &Path) -> Result<bool> {
        let absolute = Self::absolutize(path)?;
        if !self.seen.insert(absolute.clone()) {
            return Ok(false);
        }
        self.entries.push(absolute);
        Ok(true)
    }

    /// Add a file or, for a directory, every media file found below it.
    /// Returns how many new entries were queued.
    pub fn add_path(&mut self, path: &Path) -> Result<usize> {
        if path.is_dir() {
            let mut added = 0;
            for file in FileManager::find_media_files(path) {
                if self.push(&file)? {
                    added += 1;
                }
            }
            Ok(added)
        } else {
            Ok(usize::from(self.push(path)?))
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `path` (compared after canonicalization) is one of the queued sources
    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path) || path.canonicalize().is_ok_and(|canonical| self.seen.contains(&canonical))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    fn absolutize(path: &Path) -> Result<PathBuf> {
        match path.canonicalize() {
            Ok(canonical) => Ok(canonical),
            Err(_) => Ok(std::path::absolute(path)?),
        }
    }
}
