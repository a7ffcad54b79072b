//! HTTP transport: multipart POST to the conversion endpoint.
//!
//! ## Progress
//!
//! The payload is split into `chunk_size` slices and wrapped in a
//! [`reqwest::Body::wrap_stream`]. Each slice counts as sent when the
//! connection pulls it, so progress ticks arrive at the pace the socket
//! accepts data. The part carries an explicit length, which lets reqwest send
//! a `Content-Length` for the whole form.
//!
//! The request runs on its own task. Its events (progress ticks, then the
//! terminal result) go through one unbounded channel, so they reach the
//! subscriber in the order they were produced.

use crate::config::{UploadConfig, FILE_FIELD};
use crate::error::UploadError;
use crate::file::SelectedFile;
use crate::stream::{TransferEvent, TransferStream};
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

/// Starts upload attempts. One call, one attempt, one stream.
pub trait Transport: Send + Sync {
    /// Begin uploading `file`; the returned stream reports the attempt.
    ///
    /// Must be called from within a tokio runtime.
    fn start(&self, file: Arc<SelectedFile>) -> TransferStream;
}

/// [`Transport`] over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    chunk_size: usize,
    timeout_secs: Option<u64>,
}

impl HttpTransport {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let url = config.convert_url();

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("edgequake-file2pdf/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| UploadError::RequestFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            url,
            chunk_size: config.chunk_size.max(1),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn start(&self, file: Arc<SelectedFile>) -> TransferStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = self.clone();
        let task = tokio::spawn(async move {
            let terminal = match this.post(file, &tx).await {
                Ok(body) => TransferEvent::Completed(body),
                Err(e) => TransferEvent::Failed(e),
            };
            let _ = tx.send(terminal);
        });
        TransferStream::new(UnboundedReceiverStream::new(rx)).abort_on_drop(task.abort_handle())
    }
}

impl HttpTransport {
    async fn post(
        &self,
        file: Arc<SelectedFile>,
        tx: &UnboundedSender<TransferEvent>,
    ) -> Result<Vec<u8>, UploadError> {
        info!("Uploading '{}' ({} bytes) to {}", file.name(), file.size_bytes(), self.url);

        let total = file.size_bytes();
        let file_name = file.name().to_string();
        let body = counting_body(file, self.chunk_size, tx.clone());
        let part = Part::stream_with_length(body, total)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| UploadError::Internal(format!("multipart part: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::from_reqwest(&self.url, e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                UploadError::Timeout {
                    url: self.url.clone(),
                    secs: self.timeout_secs.unwrap_or_default(),
                }
            } else {
                UploadError::ResponseBody {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        debug!("Received {} bytes from {}", bytes.len(), self.url);
        Ok(bytes.to_vec())
    }
}

/// Byte ranges `[start, end)` covering `len` bytes in `chunk_size` steps.
fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    (0..len)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(len)))
        .collect()
}

/// A request body that reports a progress tick for every chunk pulled.
fn counting_body(
    file: Arc<SelectedFile>,
    chunk_size: usize,
    tx: UnboundedSender<TransferEvent>,
) -> reqwest::Body {
    let total = file.size_bytes();
    let ranges = chunk_ranges(file.bytes().len(), chunk_size);
    let mut sent = 0u64;

    let chunks = stream::iter(ranges).map(move |(start, end)| {
        let chunk = file.bytes()[start..end].to_vec();
        sent += chunk.len() as u64;
        debug!("Sent {}/{} bytes", sent, total);
        let _ = tx.send(TransferEvent::Progress {
            sent,
            total: Some(total),
        });
        Ok::<_, std::io::Error>(chunk)
    });

    reqwest::Body::wrap_stream(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_payload() {
        assert_eq!(chunk_ranges(0, 4), Vec::<(usize, usize)>::new());
        assert_eq!(chunk_ranges(3, 4), vec![(0, 3)]);
        assert_eq!(chunk_ranges(10, 4), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(chunk_ranges(8, 4), vec![(0, 4), (4, 8)]);
    }

    #[test]
    fn transport_targets_convert_path() {
        let config = UploadConfig::builder()
            .endpoint("http://127.0.0.1:9")
            .build()
            .unwrap();
        let t = HttpTransport::new(&config).unwrap();
        assert_eq!(t.url(), "http://127.0.0.1:9/convert");
    }
}
