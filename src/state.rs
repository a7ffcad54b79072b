//! The upload state container and its pure transition function.
//!
//! ```text
//!            FileChosen / FilesDropped
//!   Idle ───────────────────────────────▶ Uploading ──ArtifactSaved──▶ Done
//!                                            │  ▲                       │
//!                                AttemptFailed  └──── FileChosen ───────┤
//!                                            ▼                          │
//!                                          Failed ◀─────────────────────┘
//! ```
//!
//! [`transition`] never performs I/O. It returns the next state plus a list
//! of [`Effect`]s for the caller to execute; the
//! [`crate::controller::UploadController`] turns those into HTTP requests,
//! file writes and observer calls, and feeds the outcomes back in as new
//! [`Event`]s.
//!
//! Every attempt carries an [`AttemptId`]. Transfer events from an attempt
//! that is no longer current are ignored, so a slow response from a
//! superseded upload can never overwrite the state of the newer one.

use crate::error::{UploadError, FAILURE_NOTICE};
use crate::file::{FileSummary, SelectedFile};
use crate::progress::percent;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Monotonic tag of an upload attempt. `0` means no attempt has started.
pub type AttemptId = u64;

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadPhase {
    /// Nothing selected yet.
    #[default]
    Idle,
    /// Request dispatched, waiting for the converted document.
    Uploading,
    /// Document received and saved.
    Done,
    /// The attempt failed; a new selection starts over.
    Failed,
}

impl UploadPhase {
    /// `Done` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadPhase::Done | UploadPhase::Failed)
    }
}

/// Everything the view needs, owned by one controller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    pub phase: UploadPhase,
    pub file: Option<FileSummary>,
    /// Whole percent in `0..=100`; only meaningful while uploading or done.
    pub progress: u8,
    /// Cosmetic: a drag is hovering over the drop target.
    pub drag_over: bool,
    /// Id of the current (latest) attempt.
    pub attempt: AttemptId,
}

/// Inputs to [`transition`].
#[derive(Debug)]
pub enum Event {
    /// The user picked a file.
    FileChosen(Arc<SelectedFile>),
    /// The user dropped a set of files; only the first one is used.
    FilesDropped(Vec<Arc<SelectedFile>>),
    /// A drag entered (`true`) or left (`false`) the drop target.
    DragOver(bool),
    /// The transport handed more bytes to the connection.
    Progress {
        attempt: AttemptId,
        sent: u64,
        total: Option<u64>,
    },
    /// The endpoint answered 2xx with this body.
    ResponseReceived { attempt: AttemptId, body: Vec<u8> },
    /// The sink wrote the converted document.
    ArtifactSaved { attempt: AttemptId, path: PathBuf },
    /// Anything went wrong during the attempt.
    AttemptFailed {
        attempt: AttemptId,
        error: UploadError,
    },
}

impl Event {
    /// Attempt the event belongs to, for transfer and sink outcomes.
    pub fn attempt(&self) -> Option<AttemptId> {
        match self {
            Event::Progress { attempt, .. }
            | Event::ResponseReceived { attempt, .. }
            | Event::ArtifactSaved { attempt, .. }
            | Event::AttemptFailed { attempt, .. } => Some(*attempt),
            Event::FileChosen(_) | Event::FilesDropped(_) | Event::DragOver(_) => None,
        }
    }
}

/// Side effects requested by [`transition`].
#[derive(Debug)]
pub enum Effect {
    /// Cancel whatever is in flight and start uploading `file`.
    BeginUpload {
        attempt: AttemptId,
        file: Arc<SelectedFile>,
    },
    /// Save the converted bytes under `file_name`.
    SaveArtifact {
        attempt: AttemptId,
        file_name: String,
        bytes: Vec<u8>,
    },
    /// Tell the user the attempt failed; `error` is for the logs only.
    ShowFailure {
        attempt: AttemptId,
        message: &'static str,
        error: UploadError,
    },
    /// The document was saved at `path`.
    AnnounceSaved { path: PathBuf },
}

impl ControllerState {
    /// True when `attempt` is the current attempt and it is still uploading.
    pub fn accepts(&self, attempt: AttemptId) -> bool {
        attempt == self.attempt && self.phase == UploadPhase::Uploading
    }
}

/// Apply `event` to `state`, returning the next state and the effects to run.
pub fn transition(state: &ControllerState, event: Event) -> (ControllerState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::FileChosen(file) => {
            begin(&mut next, file, &mut effects);
        }
        Event::FilesDropped(files) => {
            next.drag_over = false;
            if let Some(first) = files.into_iter().next() {
                begin(&mut next, first, &mut effects);
            }
        }
        Event::DragOver(over) => {
            next.drag_over = over;
        }
        Event::Progress {
            attempt,
            sent,
            total,
        } => {
            if state.accepts(attempt) {
                if let Some(p) = percent(sent, total) {
                    next.progress = next.progress.max(p);
                }
            }
        }
        Event::ResponseReceived { attempt, body } => {
            if state.accepts(attempt) {
                let file_name = state
                    .file
                    .as_ref()
                    .map(FileSummary::pdf_file_name)
                    .unwrap_or_else(|| "document.pdf".to_string());
                effects.push(Effect::SaveArtifact {
                    attempt,
                    file_name,
                    bytes: body,
                });
            }
        }
        Event::ArtifactSaved { attempt, path } => {
            if state.accepts(attempt) {
                next.phase = UploadPhase::Done;
                next.progress = 100;
                effects.push(Effect::AnnounceSaved { path });
            }
        }
        Event::AttemptFailed { attempt, error } => {
            if state.accepts(attempt) {
                next.phase = UploadPhase::Failed;
                next.progress = 0;
                effects.push(Effect::ShowFailure {
                    attempt,
                    message: FAILURE_NOTICE,
                    error,
                });
            }
        }
    }

    (next, effects)
}

fn begin(next: &mut ControllerState, file: Arc<SelectedFile>, effects: &mut Vec<Effect>) {
    next.attempt += 1;
    next.phase = UploadPhase::Uploading;
    next.progress = 0;
    next.file = Some(file.summary());
    effects.push(Effect::BeginUpload {
        attempt: next.attempt,
        file,
    });
}
