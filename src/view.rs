//! Text rendering of the controller state: file card, status line, bar.

use crate::state::{ControllerState, UploadPhase};

/// Status line shown next to the file size.
pub fn status_text(state: &ControllerState) -> String {
    match state.phase {
        UploadPhase::Idle => String::new(),
        UploadPhase::Uploading => format!("Creating PDF… {}%", state.progress),
        UploadPhase::Done => "Done".to_string(),
        UploadPhase::Failed => "Failed".to_string(),
    }
}

/// A `width`-cell bar filled in proportion to `percent`.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = usize::from(percent.min(100));
    let filled = (percent * width + 50) / 100;
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat('█').take(filled));
    bar.extend(std::iter::repeat('░').take(width - filled));
    bar
}

/// One-line summary of the selected file, e.g. `[CSV] data.CSV  2.00 MB  Done`.
///
/// Returns `None` before anything has been selected.
pub fn file_card(state: &ControllerState) -> Option<String> {
    let file = state.file.as_ref()?;
    let mut line = format!(
        "[{}] {}  {}",
        file.type_label(),
        file.name,
        file.display_size()
    );
    let status = status_text(state);
    if !status.is_empty() {
        line.push_str("  ");
        line.push_str(&status);
    }
    Some(line)
}
