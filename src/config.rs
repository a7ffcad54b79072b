//! Configuration types for uploading a document to the conversion endpoint.
//!
//! All upload behaviour is controlled through [`UploadConfig`], built via its
//! [`UploadConfigBuilder`]. One struct carries the endpoint, the output
//! location and the transport knobs so that the CLI, the one-shot functions
//! and the controller all read the same settings.

use crate::error::UploadError;
use crate::pipeline::input::is_url;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Endpoint used when nothing else is configured.
///
/// Fixed at build time: set `FILE2PDF_ENDPOINT` while compiling to bake in a
/// different default.
pub const DEFAULT_ENDPOINT: &str = match option_env!("FILE2PDF_ENDPOINT") {
    Some(url) => url,
    None => "http://localhost:5000",
};

/// Path appended to the endpoint base URL.
pub const CONVERT_PATH: &str = "/convert";

/// Name of the multipart part that carries the file bytes.
pub const FILE_FIELD: &str = "file";

/// Size of each body chunk handed to the connection. Default: 64 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for an upload.
///
/// Built via [`UploadConfig::builder()`] or using [`UploadConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_file2pdf::UploadConfig;
///
/// let config = UploadConfig::builder()
///     .endpoint("http://converter.internal:5000")
///     .output_dir("out")
///     .build()
///     .unwrap();
/// assert_eq!(config.convert_url(), "http://converter.internal:5000/convert");
/// ```
#[derive(Clone)]
pub struct UploadConfig {
    /// Base URL of the conversion service. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Directory the converted PDF is saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// Replace an existing `<stem>.pdf` instead of picking `<stem> (1).pdf`.
    /// Default: false.
    pub overwrite: bool,

    /// Whole-request timeout in seconds. Default: None (wait for the network
    /// layer's own behaviour).
    pub timeout_secs: Option<u64>,

    /// Body chunk size in bytes; one progress tick per chunk. Default: 64 KiB.
    pub chunk_size: usize,

    /// Receives state changes, failure notices and saved-artifact events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            output_dir: PathBuf::from("."),
            overwrite: false,
            timeout_secs: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("endpoint", &self.endpoint)
            .field("output_dir", &self.output_dir)
            .field("overwrite", &self.overwrite)
            .field("timeout_secs", &self.timeout_secs)
            .field("chunk_size", &self.chunk_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn UploadObserver>"),
            )
            .finish()
    }
}

impl UploadConfig {
    /// Create a new builder for `UploadConfig`.
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL the multipart POST is sent to.
    pub fn convert_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), CONVERT_PATH)
    }
}

/// Builder for [`UploadConfig`].
#[derive(Debug)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<UploadConfig, UploadError> {
        let c = &self.config;
        if !is_url(&c.endpoint) {
            return Err(UploadError::InvalidConfig(format!(
                "endpoint must be an http:// or https:// URL, got '{}'",
                c.endpoint
            )));
        }
        if c.chunk_size == 0 {
            return Err(UploadError::InvalidConfig("chunk size must be ≥ 1".into()));
        }
        if c.timeout_secs == Some(0) {
            return Err(UploadError::InvalidConfig(
                "timeout must be ≥ 1 second (omit it to wait indefinitely)".into(),
            ));
        }
        Ok(self.config)
    }
}
