//! Error types for the edgequake-file2pdf library.
//!
//! [`UploadError`] names every way an upload attempt can go wrong: the input
//! file could not be read, the request never reached the endpoint, the
//! endpoint answered with a non-success status, or the converted PDF could
//! not be saved.
//!
//! The distinction matters to library callers and to the logs. It does not
//! matter to the person at the terminal: the
//! [`crate::controller::UploadController`] collapses every cause into the
//! single notice [`FAILURE_NOTICE`] and records the raw error with
//! `tracing::error!`.

use std::path::PathBuf;
use thiserror::Error;

/// The one message a user sees when an attempt fails, whatever the cause.
pub const FAILURE_NOTICE: &str = "Failed to convert file to PDF.";

/// All errors returned by the edgequake-file2pdf library.
#[derive(Debug, Error)]
pub enum UploadError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The path exists but is a directory or other non-regular file.
    #[error("'{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    /// The file was opened but reading its bytes failed.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request could not be built or sent (DNS, refused connection, TLS…).
    #[error("Upload to '{url}' failed: {reason}\nIs the conversion service running?")]
    RequestFailed { url: String, reason: String },

    /// A configured request timeout elapsed.
    #[error("Upload to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The endpoint answered with a non-2xx status.
    #[error("Conversion endpoint '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The response headers arrived but the body could not be read.
    #[error("Failed to read converted document from '{url}': {reason}")]
    ResponseBody { url: String, reason: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Attempt outcome ───────────────────────────────────────────────────
    /// An upload attempt ended in the `Failed` phase.
    ///
    /// Returned by the one-shot functions in [`crate::convert`]; `detail`
    /// carries the display text of the underlying cause.
    #[error("Failed to convert '{name}' to PDF: {detail}")]
    ConversionFailed { name: String, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Map a reqwest error raised while talking to `url`.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout_secs: Option<u64>) -> Self {
        if err.is_timeout() {
            return UploadError::Timeout {
                url: url.to_string(),
                secs: timeout_secs.unwrap_or_default(),
            };
        }
        if let Some(status) = err.status() {
            return UploadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            };
        }
        UploadError::RequestFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_display() {
        let e = UploadError::HttpStatus {
            url: "http://localhost:5000/convert".into(),
            status: 500,
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 500"), "got: {msg}");
        assert!(msg.contains("/convert"));
    }

    #[test]
    fn conversion_failed_display() {
        let e = UploadError::ConversionFailed {
            name: "invoice.docx".into(),
            detail: "connection refused".into(),
        };
        assert!(e.to_string().contains("invoice.docx"));
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn timeout_display() {
        let e = UploadError::Timeout {
            url: "http://example.test/convert".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = UploadError::OutputWriteFailed {
            path: PathBuf::from("/nope/out.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("out.pdf"));
    }
}
