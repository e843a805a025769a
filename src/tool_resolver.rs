//! # Tool Path Resolver
//!
//! This module handles finding the external transcoder (`ffmpeg`):
//! - Explicit path from preferences or the command line
//! - `METASTRIP_FFMPEG` environment variable
//! - System `PATH`
//!
//! Lookup never runs the tool: a missing transcoder must be detectable
//! without any invocation.

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable that overrides the transcoder location
pub const TRANSCODER_ENV: &str = "METASTRIP_FFMPEG";

/// Base name of the transcoder binary
pub const TRANSCODER_NAME: &str = "ffmpeg";

/// Tool path resolver for the external transcoder
pub struct ToolPathResolver {
    explicit_path: Option<PathBuf>,
}

impl ToolPathResolver {
    /// Create a new path resolver, optionally pinned to an explicit binary
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// Resolve the transcoder: explicit path, then env override, then `PATH`
    pub fn resolve_transcoder(&self) -> Option<PathBuf> {
        if let Some(ref explicit) = self.explicit_path {
            if explicit.is_file() {
                debug!("Using configured transcoder: {:?}", explicit);
                return Some(explicit.clone());
            }
            warn!("Configured transcoder does not exist: {}", explicit.display());
        }

        if let Some(from_env) = env::var_os(TRANSCODER_ENV).map(PathBuf::from) {
            if from_env.is_file() {
                debug!("Using transcoder from {}: {:?}", TRANSCODER_ENV, from_env);
                return Some(from_env);
            }
            warn!("{} points to a missing file: {}", TRANSCODER_ENV, from_env.display());
        }

        let found = Self::find_in_system_path(TRANSCODER_NAME);
        match found {
            Some(ref path) => debug!("Using system transcoder: {:?}", path),
            None => debug!("Transcoder not found in PATH"),
        }
        found
    }

    /// Find a tool in the system `PATH`
    pub fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
        let tool_with_ext = Self::platform_binary_name(tool_name);

        env::split_paths(&env::var_os("PATH")?)
            .map(|dir| dir.join(&tool_with_ext))
            .find(|path| path.is_file())
    }

    /// Get the platform-specific binary name
    pub fn platform_binary_name(tool_name: &str) -> String {
        if cfg!(windows) && Path::new(tool_name).extension().is_none() {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Installation hint shown when the transcoder is missing
    pub fn install_instructions() -> &'static str {
        if cfg!(target_os = "linux") {
            "sudo apt-get install ffmpeg"
        } else if cfg!(target_os = "macos") {
            "brew install ffmpeg"
        } else {
            "download ffmpeg from https://ffmpeg.org/download.html and add it to PATH"
        }
    }
}
