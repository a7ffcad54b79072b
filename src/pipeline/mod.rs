//! Pipeline stages of one upload attempt.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ upload ──▶ deliver
//! (path)    (HTTP)     (save PDF)
//! ```
//!
//! 1. [`input`]   — read a local file, or parse text dropped onto the
//!    terminal, into a `SelectedFile`
//! 2. [`upload`]  — multipart POST with a progress-counting body; the only
//!    stage with network I/O
//! 3. [`deliver`] — write the returned document atomically under its
//!    `.pdf` name

pub mod deliver;
pub mod input;
pub mod upload;
