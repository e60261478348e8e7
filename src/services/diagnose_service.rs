use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use serde_json::Value;
use thiserror::Error;
use tokio::{fs, process::Command};
use uuid::Uuid;

use crate::{
    config::DetectorConfig,
    dto::{diagnose::DiagnoseUnavailable, products::UploadedImage},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    services::uploads::sanitize_file_name,
};

pub const UNAVAILABLE_MESSAGE: &str =
    "Damage detection is not available on this server right now.";

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to launch detector: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("detector did not finish within {0:?}")]
    Timeout(Duration),

    #[error("detector exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("detector output is not JSON: {0}")]
    InvalidOutput(String),

    #[error("scratch file error: {0}")]
    Scratch(#[source] std::io::Error),
}

/// The detector prints progress lines and ends with a single JSON document.
pub fn parse_detector_output(stdout: &str) -> Result<Value, DetectorError> {
    let last = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| DetectorError::InvalidOutput(String::new()))?;
    serde_json::from_str(last).map_err(|_| DetectorError::InvalidOutput(last.to_string()))
}

pub async fn run_detector(config: &DetectorConfig, image: &Path) -> Result<Value, DetectorError> {
    let mut command = Command::new(&config.program);
    command
        .arg(&config.script)
        .arg(image)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(key) = &config.api_key {
        command.env("GEMINI_API_KEY", key).env("GOOGLE_API_KEY", key);
    }

    let child = command.spawn().map_err(DetectorError::Spawn)?;
    let output = tokio::time::timeout(config.timeout, child.wait_with_output())
        .await
        .map_err(|_| DetectorError::Timeout(config.timeout))?
        .map_err(DetectorError::Spawn)?;

    if !output.status.success() {
        return Err(DetectorError::Exit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    tracing::debug!(bytes = stdout.len(), "detector finished");
    parse_detector_output(&stdout)
}

/// Temporary copy of an upload handed to the detector. The file is removed when
/// the guard drops, including when the request is cancelled mid-detection.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub async fn create(dir: &Path, image: &UploadedImage) -> Result<Self, DetectorError> {
        fs::create_dir_all(dir).await.map_err(DetectorError::Scratch)?;
        let scratch = Self {
            path: dir.join(format!(
                "{}-{}",
                Uuid::new_v4(),
                sanitize_file_name(&image.file_name)
            )),
        };
        fs::write(&scratch.path, &image.bytes)
            .await
            .map_err(DetectorError::Scratch)?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "failed to remove scratch image");
            }
        }
    }
}

async fn detect(config: &DetectorConfig, image: &UploadedImage) -> Result<Value, DetectorError> {
    let scratch = ScratchFile::create(&config.scratch_dir, image).await?;
    run_detector(config, scratch.path()).await
}

/// Runs the detector on an uploaded photo. Detector failures are reported in the
/// payload, never as an HTTP error.
pub async fn diagnose(
    config: &DetectorConfig,
    image: Option<UploadedImage>,
) -> AppResult<ApiResponse<Value>> {
    let image = image.ok_or_else(|| AppError::bad_request("An image file is required"))?;
    if image.bytes.is_empty() {
        return Err(AppError::bad_request("An image file is required"));
    }

    match detect(config, &image).await {
        Ok(result) => Ok(ApiResponse::success("Diagnosis", result, Some(Meta::empty()))),
        Err(err) => {
            tracing::warn!(error = %err, "damage detection failed");
            let fallback = serde_json::to_value(DiagnoseUnavailable::new(UNAVAILABLE_MESSAGE))
                .map_err(|e| AppError::Internal(e.into()))?;
            Ok(ApiResponse::success(
                UNAVAILABLE_MESSAGE,
                fallback,
                Some(Meta::empty()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_the_last_non_empty_line() {
        let out = "loading model...\n{\"detected\": true, \"products\": []}\n\n";
        let value = parse_detector_output(out).unwrap();
        assert_eq!(value["detected"], Value::Bool(true));
    }

    #[test]
    fn rejects_non_json_tail() {
        let err = parse_detector_output("{\"a\":1}\ndone\n").unwrap_err();
        assert!(matches!(err, DetectorError::InvalidOutput(line) if line == "done"));
    }

    #[test]
    fn empty_output_is_invalid() {
        assert!(matches!(
            parse_detector_output("  \n"),
            Err(DetectorError::InvalidOutput(_))
        ));
    }
}
