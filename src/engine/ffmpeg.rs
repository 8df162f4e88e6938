use super::{output_mime, output_name, ConversionEngine, EngineError};
use crate::constants::{MOBILE_PROFILE_ARGS, MOBILE_PROFILE_TARGET};
use crate::state::{ConvertedOutput, Job};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const STDERR_TAIL_LINES: usize = 5;

/// Engine backed by the system FFmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    binary: PathBuf,
    version: String,
}

impl FfmpegEngine {
    /// Probes the binary once; a missing or broken binary fails the load.
    pub async fn load(binary: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let binary = binary.into();
        let output = Command::new(&binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::NotFound(binary.display().to_string())
                } else {
                    EngineError::LoadFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::LoadFailed(format!(
                "{} -version exited with {}",
                binary.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("ffmpeg")
            .trim()
            .to_string();

        tracing::info!("Using {}", version);
        Ok(Self { binary, version })
    }

    pub fn build_args(input: &Path, output: &Path, target_extension: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-y", "-hide_banner", "-loglevel", "error"]
            .iter()
            .map(OsString::from)
            .collect();

        args.push("-i".into());
        args.push(input.as_os_str().to_owned());

        if target_extension == MOBILE_PROFILE_TARGET {
            args.extend(MOBILE_PROFILE_ARGS.iter().map(OsString::from));
        }

        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait::async_trait]
impl ConversionEngine for FfmpegEngine {
    fn name(&self) -> &str {
        &self.version
    }

    async fn convert(&self, job: &Job) -> Result<ConvertedOutput, EngineError> {
        let target = job
            .target_extension
            .as_deref()
            .ok_or_else(|| EngineError::MissingTarget {
                file_name: job.file_name.clone(),
            })?;

        // Removed together with its contents when dropped
        let workdir = tempfile::tempdir()?;
        let input = if job.source_extension.is_empty() {
            workdir.path().join("input")
        } else {
            workdir.path().join(format!("input.{}", job.source_extension))
        };
        let output = workdir.path().join(format!("output.{}", target));

        tokio::fs::write(&input, &job.payload[..]).await?;

        tracing::debug!("Running {} for {}", self.binary.display(), job.file_name);
        let result = Command::new(&self.binary)
            .args(Self::build_args(&input, &output, target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(EngineError::Process {
                status: result.status.to_string(),
                stderr: tail,
            });
        }

        let data = tokio::fs::read(&output).await?;
        Ok(ConvertedOutput {
            name: output_name(&job.file_name, target),
            mime: output_mime(&job.file_type, target),
            data: data.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_args() {
        let args = FfmpegEngine::build_args(Path::new("in.wav"), Path::new("out.mp3"), "mp3");
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "in.wav");
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
        assert!(!args.contains(&"352x288".to_string()));
    }

    #[test]
    fn test_3gp_uses_mobile_profile() {
        let args = FfmpegEngine::build_args(Path::new("in.mp4"), Path::new("out.3gp"), "3gp");
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        let size = args.iter().position(|a| a == "-s").unwrap();
        assert_eq!(args[size + 1], "352x288");
        assert!(args.iter().position(|a| a == "-i").unwrap() < size);
        assert_eq!(args.last().map(String::as_str), Some("out.3gp"));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_load() {
        let result = FfmpegEngine::load("/nonexistent/ffmpeg-binary").await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }
}
