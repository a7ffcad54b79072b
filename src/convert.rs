//! One-shot conversion entry points.
//!
//! These wrap a fresh [`UploadController`] around a single attempt and wait
//! for it to settle. Use the controller directly when several selections can
//! arrive over time (the interactive CLI does), or
//! [`crate::stream::upload_stream`] for raw transfer events.

use crate::config::UploadConfig;
use crate::controller::UploadController;
use crate::error::UploadError;
use crate::file::SelectedFile;
use crate::pipeline::input;
use crate::state::{AttemptId, UploadPhase};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionReport {
    /// Name of the uploaded file.
    pub input_name: String,
    /// Size of the uploaded file in bytes.
    pub input_size: u64,
    /// Where the PDF was saved.
    pub output_path: PathBuf,
    /// Size of the saved PDF in bytes.
    pub output_size: u64,
    /// Attempt id within the controller that produced it.
    pub attempt: AttemptId,
    /// Wall-clock time from selection to saved PDF.
    pub duration_ms: u64,
}

/// Upload a local file and save the returned PDF into `config.output_dir`.
///
/// # Errors
/// - input errors (`FileNotFound`, `PermissionDenied`, …) before any upload
/// - [`UploadError::ConversionFailed`] when the attempt ends `Failed`; the
///   detail names the underlying cause
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &UploadConfig,
) -> Result<ConversionReport, UploadError> {
    let file = input::resolve_path(path).await?;
    convert_selected(file, config).await
}

/// Upload in-memory bytes under `name` and save the returned PDF.
pub async fn convert_bytes(
    name: impl Into<String>,
    bytes: impl Into<Vec<u8>>,
    config: &UploadConfig,
) -> Result<ConversionReport, UploadError> {
    convert_selected(SelectedFile::new(name, bytes), config).await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_file_sync(
    path: impl AsRef<Path>,
    config: &UploadConfig,
) -> Result<ConversionReport, UploadError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| UploadError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(path, config))
}

async fn convert_selected(
    file: SelectedFile,
    config: &UploadConfig,
) -> Result<ConversionReport, UploadError> {
    let start = Instant::now();
    let input_name = file.name().to_string();
    let input_size = file.size_bytes();

    let mut controller = UploadController::from_config(config)?;
    controller.select_file(file).await;
    let phase = controller.run_until_settled().await.phase;
    let attempt = controller.state().attempt;

    match (phase, controller.last_saved()) {
        (UploadPhase::Done, Some(path)) => {
            let output_path = path.to_path_buf();
            let output_size = tokio::fs::metadata(&output_path)
                .await
                .map_err(|e| UploadError::OutputWriteFailed {
                    path: output_path.clone(),
                    source: e,
                })?
                .len();
            let duration_ms = start.elapsed().as_millis() as u64;
            info!(
                "Converted '{}' → {} in {}ms",
                input_name,
                output_path.display(),
                duration_ms
            );
            Ok(ConversionReport {
                input_name,
                input_size,
                output_path,
                output_size,
                attempt,
                duration_ms,
            })
        }
        _ => Err(UploadError::ConversionFailed {
            name: input_name,
            detail: controller
                .last_error()
                .unwrap_or("upload did not complete")
                .to_string(),
        }),
    }
}
