//! Input resolution: turn a path, or text dropped onto the terminal, into a
//! [`SelectedFile`].
//!
//! Most terminal emulators answer a file drag-and-drop by pasting the file's
//! path, quoted or backslash-escaped the way their shell expects, sometimes
//! as a `file://` URI. [`parse_dropped`] undoes that so the interactive CLI
//! can treat each pasted line as one dropped set of files.

use crate::error::UploadError;
use crate::file::SelectedFile;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file into memory.
///
/// No type or size check is made: any regular file can be uploaded.
pub async fn resolve_path(path: impl AsRef<Path>) -> Result<SelectedFile, UploadError> {
    let path = path.as_ref();

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| map_io(path, e))?;
    if !meta.is_file() {
        return Err(UploadError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| map_io(path, e))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Resolved local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(SelectedFile::new(name, bytes))
}

fn map_io(path: &Path, e: std::io::Error) -> UploadError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => UploadError::FileNotFound { path },
        ErrorKind::PermissionDenied => UploadError::PermissionDenied { path },
        _ => UploadError::ReadFailed { path, source: e },
    }
}

/// Split text pasted by a terminal drag-and-drop into paths.
///
/// Understands whitespace separation, `'single'` and `"double"` quotes,
/// backslash escapes outside single quotes, and `file:` URIs.
pub fn parse_dropped(text: &str) -> Vec<PathBuf> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = text.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_token = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => {
                            if let Some(esc) = chars.next() {
                                current.push(esc);
                            }
                        }
                        _ => current.push(q),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(esc) = chars.next() {
                    current.push(esc);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(|t| file_uri_path(&t).unwrap_or_else(|| PathBuf::from(t)))
        .collect()
}

/// Local path named by a `file:` URI, or `None` when `token` is not one.
fn file_uri_path(token: &str) -> Option<PathBuf> {
    if !token.starts_with("file:") {
        return None;
    }
    reqwest::Url::parse(token).ok()?.to_file_path().ok()
}
