//! Recognition through external programs.
//!
//! The audio is optionally converted to WAV with ffmpeg, then handed to a
//! recognizer command invoked as `<program> <args>... <workdir> <audio>`.
//! Whatever the recognizer prints on stdout is the transcription.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::PipelineError;
use crate::recognizer::{PipelineFuture, RecognitionPipeline};

/// Stderr kept in error messages, counted from the end.
const MAX_STDERR_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    ffmpeg: Option<PathBuf>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            ffmpeg: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Convert input audio to WAV with this ffmpeg binary before recognition.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(ffmpeg.into());
        self
    }

    async fn convert(&self, ffmpeg: &Path, audio: &Path, wav: &Path) -> Result<(), PipelineError> {
        tracing::debug!("Converting {} to {}", audio.display(), wav.display());

        let output = Command::new(ffmpeg)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(audio)
            .arg(wav)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                program: ffmpeg.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(PipelineError::Conversion {
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    async fn run(&self, workdir: &Path, audio: &Path) -> Result<String, PipelineError> {
        let input = match &self.ffmpeg {
            Some(ffmpeg) if !is_wav(audio) => {
                let wav = workdir.join(audio.with_extension("wav").file_name().unwrap_or_default());
                self.convert(ffmpeg, audio, &wav).await?;
                wav
            }
            _ => audio.to_path_buf(),
        };

        // Dropping this future (e.g. on timeout) kills the child.
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(workdir)
            .arg(&input)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PipelineError::Recognizer {
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl RecognitionPipeline for CommandPipeline {
    fn name(&self) -> &str {
        &self.program
    }

    fn recognize<'a>(&'a self, workdir: &'a Path, audio: &'a Path) -> PipelineFuture<'a> {
        Box::pin(self.run(workdir, audio))
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(MAX_STDERR_CHARS);
    text.chars().skip(skip).collect()
}
