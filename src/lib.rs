//! # edgequake-file2pdf
//!
//! Upload any document to a conversion service and save the PDF it returns.
//!
//! ## Flow Overview
//!
//! ```text
//! file / drop
//!  │
//!  ├─ 1. Select   read the file; new attempt id, progress 0, Uploading
//!  ├─ 2. Upload   multipart POST <endpoint>/convert, part "file"
//!  ├─ 3. Progress round(sent * 100 / total), never decreasing
//!  ├─ 4. Save     <stem>.pdf written atomically to the output dir → Done
//!  └─ 5. Fail     any error → one notice, progress 0 → Failed
//! ```
//!
//! All state lives in one [`ControllerState`] owned by an
//! [`UploadController`]. Transitions are computed by the pure
//! [`state::transition`] function, which makes the whole flow testable
//! without a network or a terminal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_file2pdf::{convert_file, UploadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UploadConfig::builder()
//!         .endpoint("http://localhost:5000")
//!         .output_dir("converted")
//!         .build()?;
//!     let report = convert_file("invoice.docx", &config).await?;
//!     eprintln!("saved {} ({} bytes)", report.output_path.display(), report.output_size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `file2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-file2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod stream;
pub mod view;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{UploadConfig, UploadConfigBuilder, DEFAULT_ENDPOINT};
pub use controller::UploadController;
pub use convert::{convert_bytes, convert_file, convert_file_sync, ConversionReport};
pub use error::{UploadError, FAILURE_NOTICE};
pub use file::{FileSummary, SelectedFile};
pub use pipeline::deliver::{ArtifactSink, DirectorySink};
pub use pipeline::input::{parse_dropped, resolve_path};
pub use pipeline::upload::{HttpTransport, Transport};
pub use progress::{NoopObserver, ProgressCallback, UploadObserver};
pub use state::{AttemptId, ControllerState, UploadPhase};
pub use stream::{upload_stream, TransferEvent, TransferStream};
