//! The selected file and the naming rules derived from its name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A file the user picked or dropped: its bytes plus name and size.
///
/// Replaced wholesale on every selection and never mutated; the controller
/// shares it as `Arc<SelectedFile>` between the state machine and the
/// transfer task.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    /// Wrap raw bytes under the given file name. No type or size check is made.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Metadata without the payload, as held in the controller state.
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            size_bytes: self.size_bytes(),
        }
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Name and size of the selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub name: String,
    pub size_bytes: u64,
}

impl FileSummary {
    /// Size in mebibytes with two decimals, e.g. `"2.00 MB"`.
    pub fn display_size(&self) -> String {
        display_size(self.size_bytes)
    }

    /// Upper-cased suffix shown on the file icon, e.g. `"CSV"`.
    pub fn type_label(&self) -> String {
        type_label(&self.name)
    }

    /// Name the converted document is saved under.
    pub fn pdf_file_name(&self) -> String {
        pdf_file_name(&self.name)
    }
}

/// Format a byte count as mebibytes with two decimals and an ` MB` suffix.
pub fn display_size(size_bytes: u64) -> String {
    format!("{:.2} MB", size_bytes as f64 / 1024.0 / 1024.0)
}

/// Text after the last `.` in upper case, or the whole name when there is none.
pub fn type_label(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_uppercase()
}

/// Stem of `name` followed by `.pdf`.
///
/// The stem is everything before the first `.`, so `archive.tar.gz` becomes
/// `archive.pdf`. Names that start with a dot keep the whole name as stem.
pub fn pdf_file_name(name: &str) -> String {
    let stem = match name.split('.').next() {
        Some(s) if !s.is_empty() => s,
        _ => name,
    };
    format!("{stem}.pdf")
}
