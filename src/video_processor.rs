//! # Video Processing Module
//!
//! Questo modulo gestisce lo stripping dei metadata video tramite FFmpeg.
//!
//! ## Responsabilità:
//! - Invocazione di FFmpeg come subprocess con timeout (default 300s)
//! - Remux senza ricodifica (`-c copy`), quindi veloce e senza perdita
//! - Profilo di fallback più compatibile per MP4/MOV
//! - Traduzione dello stderr di FFmpeg in messaggi comprensibili
//!
//! ## Profili:
//! - **Full**: `-i IN -map_metadata -1 -map 0 -c copy -movflags faststart -y OUT`
//! - **Compat** (solo MP4/MOV): `-i IN -map_metadata -1 -c:v copy -c:a copy -f mp4 -y OUT`
//!
//! ## Timeout:
//! Allo scadere il processo figlio viene terminato (`kill_on_drop`) e il
//! tentativo conta come fallito, esattamente come un exit code ≠ 0.
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new(resolver.resolve_transcoder(), DEFAULT_TRANSCODE_TIMEOUT);
//! processor.transcode(&input, &output, TranscodeProfile::Full).await?;
//! ```

use crate::error::StripError;
use crate::file_manager::FileManager;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Wall-clock limit for a single transcoder invocation
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Extensions the compatibility profile is allowed to retry
const COMPAT_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Known FFmpeg stderr fragments and the message shown to the user
const KNOWN_ERRORS: &[(&str, &str)] = &[
    ("No such file or directory", "FFmpeg could not find the input file."),
    (
        "Invalid data found when processing input",
        "The video file appears to be corrupt or in an unsupported format.",
    ),
    ("Permission denied", "FFmpeg was not allowed to read the input or write the output."),
    ("moov atom not found", "The video file is incomplete (moov atom missing)."),
    (
        "Could not find tag for codec",
        "The video contains a stream the output container cannot hold without re-encoding.",
    ),
    ("Output file is empty", "FFmpeg produced an empty file."),
];

/// Argument set used for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeProfile {
    /// Strip everything, copy all streams, move the index to the front
    Full,
    /// Narrower mapping forcing the MP4 muxer
    Compat,
}

impl TranscodeProfile {
    pub fn applies_to(&self, input: &Path) -> bool {
        match self {
            Self::Full => true,
            Self::Compat => FileManager::extension_of(input)
                .is_some_and(|ext| COMPAT_EXTENSIONS.contains(&ext.as_str())),
        }
    }

    /// Argument vector (without the program name)
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let flags: &[&str] = match self {
            Self::Full => &["-map_metadata", "-1", "-map", "0", "-c", "copy", "-movflags", "faststart", "-y"],
            Self::Compat => &["-map_metadata", "-1", "-c:v", "copy", "-c:a", "copy", "-f", "mp4", "-y"],
        };

        let mut args = vec![OsString::from("-i"), input.as_os_str().to_owned()];
        args.extend(flags.iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// Handles video metadata stripping through the external transcoder
pub struct VideoProcessor {
    transcoder: Option<PathBuf>,
    timeout: Duration,
}

impl VideoProcessor {
    pub fn new(transcoder: Option<PathBuf>, timeout: Duration) -> Self {
        Self { transcoder, timeout }
    }

    pub fn is_available(&self) -> bool {
        self.transcoder.is_some()
    }

    pub fn transcoder(&self) -> Option<&Path> {
        self.transcoder.as_deref()
    }

    /// Run one transcoder invocation with the given profile
    pub async fn transcode(&self, input: &Path, output: &Path, profile: TranscodeProfile) -> Result<(), StripError> {
        let program = self.transcoder.as_ref().ok_or(StripError::TranscoderAbsent)?;

        debug!(
            "🎬 Stripping video metadata ({:?}): {}",
            profile,
            input.file_name().unwrap_or_default().to_string_lossy()
        );

        let mut cmd = Command::new(program);
        cmd.args(profile.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start_time = Instant::now();
        let result = tokio::time::timeout(self.timeout, cmd.output()).await;
        let duration = start_time.elapsed();

        let output = match result {
            Ok(output) => output.map_err(|e| {
                StripError::Transcoder(format!("Failed to execute {}: {}", program.display(), e))
            })?,
            Err(_) => {
                warn!("FFmpeg timed out after {:.1}s on {}", duration.as_secs_f64(), input.display());
                return Err(StripError::Timeout);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("FFmpeg failed after {:.1}s: {}", duration.as_secs_f64(), stderr);
            return Err(StripError::Transcoder(Self::describe_failure(&stderr, output.status.code())));
        }

        debug!("✅ Video metadata stripped in {:.1}s", duration.as_secs_f64());
        Ok(())
    }

    /// Map FFmpeg stderr to a user-facing message; unknown errors pass through verbatim
    pub fn describe_failure(stderr: &str, exit_code: Option<i32>) -> String {
        if let Some((_, message)) = KNOWN_ERRORS.iter().find(|(needle, _)| stderr.contains(needle)) {
            return message.to_string();
        }

        let trimmed = stderr.trim();
        if trimmed.is_empty() {
            match exit_code {
                Some(code) => format!("FFmpeg exited with status {}", code),
                None => "FFmpeg was terminated by a signal".to_string(),
            }
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(profile: TranscodeProfile, input: &str, output: &str) -> Vec<String> {
        profile
            .args(Path::new(input), Path::new(output))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_full_profile_arguments() {
        let args = args_as_strings(TranscodeProfile::Full, "/in/b.mkv", "/out/b.mkv");
        assert_eq!(
            args,
            vec![
                "-i", "/in/b.mkv", "-map_metadata", "-1", "-map", "0", "-c", "copy",
                "-movflags", "faststart", "-y", "/out/b.mkv",
            ]
        );
    }

    #[test]
    fn test_compat_profile_arguments() {
        let args = args_as_strings(TranscodeProfile::Compat, "/in/b.mov", "/out/b.mov");
        assert_eq!(
            args,
            vec![
                "-i", "/in/b.mov", "-map_metadata", "-1", "-c:v", "copy", "-c:a", "copy",
                "-f", "mp4", "-y", "/out/b.mov",
            ]
        );
    }

    #[test]
    fn test_compat_only_for_permissive_containers() {
        assert!(TranscodeProfile::Compat.applies_to(Path::new("x.MP4")));
        assert!(TranscodeProfile::Compat.applies_to(Path::new("x.mov")));
        assert!(!TranscodeProfile::Compat.applies_to(Path::new("x.avi")));
        assert!(!TranscodeProfile::Compat.applies_to(Path::new("x.mkv")));
        assert!(TranscodeProfile::Full.applies_to(Path::new("x.avi")));
    }

    #[test]
    fn test_describe_known_errors() {
        let stderr = "[mov,mp4] b.mp4: Invalid data found when processing input\n";
        assert_eq!(
            VideoProcessor::describe_failure(stderr, Some(1)),
            "The video file appears to be corrupt or in an unsupported format."
        );
        assert_eq!(
            VideoProcessor::describe_failure("x: No such file or directory", Some(1)),
            "FFmpeg could not find the input file."
        );
    }

    #[test]
    fn test_describe_unknown_error_verbatim() {
        assert_eq!(
            VideoProcessor::describe_failure("  something odd happened\n", Some(1)),
            "something odd happened"
        );
        assert_eq!(VideoProcessor::describe_failure("", Some(69)), "FFmpeg exited with status 69");
    }

    #[tokio::test]
    async fn test_absent_transcoder_is_not_invoked() {
        let processor = VideoProcessor::new(None, DEFAULT_TRANSCODE_TIMEOUT);
        assert!(!processor.is_available());
        let result = processor
            .transcode(Path::new("b.mp4"), Path::new("out.mp4"), TranscodeProfile::Full)
            .await;
        assert!(matches!(result, Err(StripError::TranscoderAbsent)));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Writes an executable shell script standing in for ffmpeg
        fn fake_transcoder(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_successful_invocation_writes_output() {
            let temp_dir = TempDir::new().unwrap();
            // $2 is the input, the last argument is the output
            let tool = fake_transcoder(temp_dir.path(), r#"for last; do :; done; cp "$2" "$last""#);
            let input = temp_dir.path().join("b.mp4");
            let output = temp_dir.path().join("b_out.mp4");
            std::fs::write(&input, b"video").unwrap();

            let processor = VideoProcessor::new(Some(tool), DEFAULT_TRANSCODE_TIMEOUT);
            processor.transcode(&input, &output, TranscodeProfile::Full).await.unwrap();
            assert_eq!(std::fs::read(&output).unwrap(), b"video");
        }

        #[tokio::test]
        async fn test_stderr_becomes_diagnostic() {
            let temp_dir = TempDir::new().unwrap();
            let tool = fake_transcoder(
                temp_dir.path(),
                "echo 'b.mp4: Invalid data found when processing input' >&2; exit 1",
            );
            let processor = VideoProcessor::new(Some(tool), DEFAULT_TRANSCODE_TIMEOUT);
            let result = processor
                .transcode(Path::new("b.mp4"), &temp_dir.path().join("o.mp4"), TranscodeProfile::Full)
                .await;

            match result {
                Err(StripError::Transcoder(message)) => {
                    assert_eq!(message, "The video file appears to be corrupt or in an unsupported format.")
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_timeout_is_failure() {
            let temp_dir = TempDir::new().unwrap();
            let tool = fake_transcoder(temp_dir.path(), "sleep 5");
            let processor = VideoProcessor::new(Some(tool), Duration::from_millis(200));
            let result = processor
                .transcode(Path::new("b.mp4"), &temp_dir.path().join("o.mp4"), TranscodeProfile::Full)
                .await;
            assert!(matches!(result, Err(StripError::Timeout)));
        }
    }
}
