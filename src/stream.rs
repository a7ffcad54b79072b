//! Per-attempt transfer events as a single-subscriber stream.
//!
//! A transport reports an upload as a finite sequence: zero or more
//! [`TransferEvent::Progress`] ticks followed by exactly one terminal event,
//! [`TransferEvent::Completed`] or [`TransferEvent::Failed`].
//! [`TransferStream`] enforces that shape whatever the underlying source
//! does: it stops after the first terminal event, and turns a source that
//! ends early into a `Failed` event.
//!
//! Dropping a `TransferStream` aborts the task producing it, which is how
//! the controller cancels an upload superseded by a newer selection.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::file::SelectedFile;
use crate::pipeline::upload::{HttpTransport, Transport};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::AbortHandle;

/// One step of an upload attempt.
#[derive(Debug)]
pub enum TransferEvent {
    /// `sent` bytes of the payload have been handed to the connection.
    Progress { sent: u64, total: Option<u64> },
    /// The endpoint answered 2xx; the body is the converted document.
    Completed(Vec<u8>),
    /// The attempt failed.
    Failed(UploadError),
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferEvent::Progress { .. })
    }
}

/// A finite stream of [`TransferEvent`]s ending in one terminal event.
pub struct TransferStream {
    inner: Pin<Box<dyn Stream<Item = TransferEvent> + Send>>,
    producer: Option<AbortHandle>,
    finished: bool,
}

impl TransferStream {
    /// Wrap any event source.
    pub fn new(inner: impl Stream<Item = TransferEvent> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
            producer: None,
            finished: false,
        }
    }

    /// Abort `handle` when this stream is dropped.
    pub fn abort_on_drop(mut self, handle: AbortHandle) -> Self {
        self.producer = Some(handle);
        self
    }
}

impl Stream for TransferStream {
    type Item = TransferEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TransferEvent>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(event)) => {
                this.finished = event.is_terminal();
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(Some(TransferEvent::Failed(UploadError::Internal(
                    "transfer ended without a response".into(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TransferStream {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

/// Upload `file` to the configured endpoint, yielding transfer events.
///
/// Lower level than [`crate::convert::convert_file`]: nothing is saved and no
/// controller state is kept. Must be called from within a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use edgequake_file2pdf::{upload_stream, SelectedFile, TransferEvent, UploadConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = SelectedFile::new("notes.txt", std::fs::read("notes.txt")?);
/// let mut events = upload_stream(file, &UploadConfig::default())?;
/// while let Some(event) = events.next().await {
///     match event {
///         TransferEvent::Progress { sent, total } => eprintln!("{sent}/{total:?}"),
///         TransferEvent::Completed(pdf) => std::fs::write("notes.pdf", pdf)?,
///         TransferEvent::Failed(e) => eprintln!("{e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn upload_stream(
    file: SelectedFile,
    config: &UploadConfig,
) -> Result<TransferStream, UploadError> {
    let transport = HttpTransport::new(config)?;
    Ok(transport.start(Arc::new(file)))
}
