//! Observer trait for upload lifecycle events, plus the percent mapping.
//!
//! Inject an [`Arc<dyn UploadObserver>`] via
//! [`crate::config::UploadConfigBuilder::progress_callback`] to receive
//! every state change the controller makes, the user-facing failure notice,
//! and the path of each saved PDF.
//!
//! The CLI implements this trait with an `indicatif` progress bar; tests
//! implement it with counters. The library never prints anything itself.
//!
//! # Example
//!
//! ```rust
//! use edgequake_file2pdf::{ControllerState, UploadConfig, UploadObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     notices: AtomicUsize,
//! }
//!
//! impl UploadObserver for CountingObserver {
//!     fn on_failure_notice(&self, message: &str) {
//!         self.notices.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{message}");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { notices: AtomicUsize::new(0) });
//!
//! let config = UploadConfig::builder()
//!     .progress_callback(observer as Arc<dyn UploadObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::state::ControllerState;
use std::path::Path;
use std::sync::Arc;

/// Called by the upload controller as an attempt moves through its phases.
///
/// Implementations must be `Send + Sync`: the controller may live on any
/// tokio worker. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait UploadObserver: Send + Sync {
    /// Called after every event the controller applies, with the new state.
    fn on_state_change(&self, state: &ControllerState) {
        let _ = state;
    }

    /// Called exactly once per failed attempt with the user-facing message.
    fn on_failure_notice(&self, message: &str) {
        let _ = message;
    }

    /// Called once the converted PDF has been written.
    ///
    /// # Arguments
    /// * `path` — final location of the saved document
    fn on_artifact_saved(&self, path: &Path) {
        let _ = path;
    }
}

/// A no-op observer for callers that don't need events.
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::UploadConfig`].
pub type ProgressCallback = Arc<dyn UploadObserver>;

/// Map transport byte counters to a whole percentage.
///
/// Returns `None` when the total is unknown or zero: the caller then leaves
/// progress unreported instead of guessing. The result is clamped to 100 in
/// case a transport over-reports `sent`.
pub fn percent(sent: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|&t| t > 0)?;
    let sent = sent.min(total) as u128;
    let total = total as u128;
    // round-half-up of sent * 100 / total
    let pct = (sent * 100 * 2 + total) / (total * 2);
    Some(pct.min(100) as u8)
}
