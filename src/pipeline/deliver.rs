//! Saving the converted document.
//!
//! [`DirectorySink`] writes the PDF the way a browser download does: into one
//! directory, never leaving a half-written file behind, and without
//! clobbering an earlier download of the same name unless asked to.
//!
//! ```text
//! invoice.pdf        first save
//! invoice (1).pdf    second save, overwrite = false
//! invoice (2).pdf    …
//! ```

use crate::config::UploadConfig;
use crate::error::UploadError;
use futures::future::BoxFuture;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on `name (n).pdf` candidates before giving up.
const MAX_NAME_SUFFIX: u32 = 1000;

/// Receives the bytes of a converted document and stores them somewhere.
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `file_name`; returns where it ended up.
    fn deliver<'a>(
        &'a self,
        file_name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<PathBuf, UploadError>>;
}

/// Saves documents into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.output_dir.clone(), config.overwrite)
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver<'a>(
        &'a self,
        file_name: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<PathBuf, UploadError>> {
        Box::pin(async move {
            if !bytes.starts_with(b"%PDF") {
                warn!(
                    "Response for '{}' does not start with %PDF; saving it anyway",
                    file_name
                );
            }

            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| UploadError::OutputWriteFailed {
                    path: self.dir.clone(),
                    source: e,
                })?;

            let dir = self.dir.clone();
            let name = file_name.to_string();
            let overwrite = self.overwrite;
            tokio::task::spawn_blocking(move || write_atomic(&dir, &name, &bytes, overwrite))
                .await
                .map_err(|e| UploadError::Internal(format!("save task failed: {e}")))?
        })
    }
}

/// `invoice.pdf` → `invoice (n).pdf`; `n == 0` keeps the name.
fn candidate_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({n}){}", &file_name[..dot], &file_name[dot..]),
        _ => format!("{file_name} ({n})"),
    }
}

/// Write to a temp file in `dir`, then move it into place.
fn write_atomic(
    dir: &Path,
    file_name: &str,
    bytes: &[u8],
    overwrite: bool,
) -> Result<PathBuf, UploadError> {
    let target = dir.join(file_name);
    let write_err = |source| UploadError::OutputWriteFailed {
        path: target.clone(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    // NamedTempFile is created 0600; downloads are normally world-readable.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(write_err)?;
    }

    if overwrite {
        tmp.persist(&target).map_err(|e| write_err(e.error))?;
        debug!("Saved {}", target.display());
        return Ok(target.clone());
    }

    for n in 0..=MAX_NAME_SUFFIX {
        let path = dir.join(candidate_name(file_name, n));
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!("Saved {}", path.display());
                return Ok(path);
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => tmp = e.file,
            Err(e) => {
                return Err(UploadError::OutputWriteFailed {
                    path,
                    source: e.error,
                })
            }
        }
    }

    Err(write_err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("{MAX_NAME_SUFFIX} files named like '{file_name}' already exist"),
    )))
}
