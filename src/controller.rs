//! The upload flow controller.
//!
//! [`UploadController`] owns the [`ControllerState`] and is the only thing
//! that mutates it. Every input (a selection, a drop, a drag flag, a
//! transfer tick, a finished save) becomes an [`Event`], goes through the
//! pure [`transition`] function, and the returned [`Effect`]s are executed
//! here.
//!
//! Transfers run on spawned tasks and report back through an unbounded
//! channel; [`UploadController::next_event`] hands those events to the owner
//! so that they are applied one at a time on the owner's task. Starting a new
//! attempt aborts the previous transfer, and anything it already queued is
//! discarded by attempt id.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::file::SelectedFile;
use crate::pipeline::deliver::{ArtifactSink, DirectorySink};
use crate::pipeline::upload::{HttpTransport, Transport};
use crate::progress::{NoopObserver, ProgressCallback};
use crate::state::{transition, AttemptId, ControllerState, Effect, Event, UploadPhase};
use crate::stream::TransferEvent;
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Drives upload attempts for one drop target.
pub struct UploadController {
    state: ControllerState,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ArtifactSink>,
    observer: ProgressCallback,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
    in_flight: Option<JoinHandle<()>>,
    last_error: Option<String>,
    last_saved: Option<PathBuf>,
}

impl UploadController {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ArtifactSink>,
        observer: Option<ProgressCallback>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: ControllerState::default(),
            transport,
            sink,
            observer: observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            events_tx,
            events_rx,
            in_flight: None,
            last_error: None,
            last_saved: None,
        }
    }

    /// HTTP transport to the configured endpoint, saving into `output_dir`.
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(DirectorySink::from_config(config)),
            config.progress_callback.clone(),
        ))
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Display text of the cause of the most recent failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Where the most recent successful attempt saved its document.
    pub fn last_saved(&self) -> Option<&Path> {
        self.last_saved.as_deref()
    }

    /// Pick a file and start uploading it immediately.
    pub async fn select_file(&mut self, file: SelectedFile) {
        self.handle(Event::FileChosen(Arc::new(file))).await;
    }

    /// Drop a set of files; only the first is uploaded.
    pub async fn drop_files(&mut self, files: Vec<SelectedFile>) {
        let files = files.into_iter().map(Arc::new).collect();
        self.handle(Event::FilesDropped(files)).await;
    }

    pub async fn set_drag_over(&mut self, over: bool) {
        self.handle(Event::DragOver(over)).await;
    }

    /// Wait for the next event reported by an in-flight transfer.
    ///
    /// Pass the result to [`handle`](Self::handle). Never returns `None`
    /// while the controller is alive; it simply waits when nothing is in
    /// flight.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events_rx.recv().await
    }

    /// Apply events until the current attempt reaches `Done` or `Failed`.
    ///
    /// Returns immediately when nothing is uploading.
    pub async fn run_until_settled(&mut self) -> &ControllerState {
        while self.state.phase == UploadPhase::Uploading {
            match self.events_rx.recv().await {
                Some(event) => self.handle(event).await,
                None => break,
            }
        }
        &self.state
    }

    /// Apply one event and every follow-up event its effects produce.
    pub async fn handle(&mut self, event: Event) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            if let Some(attempt) = event.attempt() {
                if !self.state.accepts(attempt) {
                    debug!(
                        "Discarding event for attempt {} (current {}, {:?})",
                        attempt, self.state.attempt, self.state.phase
                    );
                    continue;
                }
            }

            let (next, effects) = transition(&self.state, event);
            let changed = next != self.state;
            self.state = next;
            if changed {
                self.observer.on_state_change(&self.state);
            }

            for effect in effects {
                if let Some(follow_up) = self.execute(effect).await {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    async fn execute(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::BeginUpload { attempt, file } => {
                self.begin_upload(attempt, file);
                None
            }
            Effect::SaveArtifact {
                attempt,
                file_name,
                bytes,
            } => {
                let sink = Arc::clone(&self.sink);
                Some(match sink.deliver(&file_name, bytes).await {
                    Ok(path) => Event::ArtifactSaved { attempt, path },
                    Err(error) => Event::AttemptFailed { attempt, error },
                })
            }
            Effect::ShowFailure {
                attempt,
                message,
                error,
            } => {
                error!("Attempt {} failed: {}", attempt, error);
                self.last_error = Some(error.to_string());
                self.observer.on_failure_notice(message);
                None
            }
            Effect::AnnounceSaved { path } => {
                info!("Saved converted document to {}", path.display());
                self.observer.on_artifact_saved(&path);
                self.last_saved = Some(path);
                None
            }
        }
    }

    fn begin_upload(&mut self, attempt: AttemptId, file: Arc<SelectedFile>) {
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                debug!("Cancelling upload superseded by attempt {}", attempt);
            }
            previous.abort();
        }
        self.last_error = None;
        self.last_saved = None;

        let mut transfer = self.transport.start(file);
        let tx = self.events_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            while let Some(event) = transfer.next().await {
                let event = match event {
                    TransferEvent::Progress { sent, total } => Event::Progress {
                        attempt,
                        sent,
                        total,
                    },
                    TransferEvent::Completed(body) => Event::ResponseReceived { attempt, body },
                    TransferEvent::Failed(error) => Event::AttemptFailed { attempt, error },
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FAILURE_NOTICE;
    use crate::progress::UploadObserver;
    use crate::stream::TransferStream;
    use futures::future::BoxFuture;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a scripted list of events for each attempt, in order.
    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Vec<TransferEvent>>>,
        started: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Vec<TransferEvent>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                started: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for ScriptedTransport {
        fn start(&self, file: Arc<SelectedFile>) -> TransferStream {
            self.started.lock().unwrap().push(file.name().to_string());
            match self.scripts.lock().unwrap().pop_front() {
                Some(events) => TransferStream::new(stream::iter(events)),
                None => TransferStream::new(stream::pending()),
            }
        }
    }

    /// Transport whose first attempt never finishes until released.
    struct StallingTransport {
        release: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    impl Transport for StallingTransport {
        fn start(&self, file: Arc<SelectedFile>) -> TransferStream {
            match self.release.lock().unwrap().take() {
                Some(rx) => {
                    let name = file.name().to_string();
                    TransferStream::new(stream::once(async move {
                        let _ = rx.await;
                        TransferEvent::Completed(format!("late {name}").into_bytes())
                    }))
                }
                None => TransferStream::new(stream::iter(vec![TransferEvent::Completed(
                    b"%PDF fresh".to_vec(),
                )])),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl ArtifactSink for MemorySink {
        fn deliver<'a>(
            &'a self,
            file_name: &'a str,
            bytes: Vec<u8>,
        ) -> BoxFuture<'a, Result<PathBuf, UploadError>> {
            Box::pin(async move {
                if self.fail {
                    return Err(UploadError::OutputWriteFailed {
                        path: PathBuf::from(file_name),
                        source: std::io::Error::new(std::io::ErrorKind::Other, "read-only"),
                    });
                }
                self.saved
                    .lock()
                    .unwrap()
                    .push((file_name.to_string(), bytes));
                Ok(PathBuf::from(file_name))
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        notices: AtomicUsize,
        saved: AtomicUsize,
        progress: Mutex<Vec<u8>>,
    }

    impl UploadObserver for Recorder {
        fn on_state_change(&self, state: &ControllerState) {
            self.progress.lock().unwrap().push(state.progress);
        }

        fn on_failure_notice(&self, message: &str) {
            assert_eq!(message, FAILURE_NOTICE);
            self.notices.fetch_add(1, Ordering::SeqCst);
        }

        fn on_artifact_saved(&self, _path: &Path) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn progress(sent: u64, total: u64) -> TransferEvent {
        TransferEvent::Progress {
            sent,
            total: Some(total),
        }
    }

    fn controller(
        transport: Arc<dyn Transport>,
        sink: Arc<MemorySink>,
        recorder: Arc<Recorder>,
    ) -> UploadController {
        UploadController::new(transport, sink, Some(recorder as ProgressCallback))
    }

    #[tokio::test]
    async fn invoice_scenario_downloads_pdf() {
        let total = 1_048_576;
        let transport = ScriptedTransport::new(vec![vec![
            progress(262_144, total),
            progress(524_288, total),
            progress(1_048_576, total),
            TransferEvent::Completed(b"%PDF-1.7 invoice".to_vec()),
        ]]);
        let sink = Arc::new(MemorySink::default());
        let recorder = Arc::new(Recorder::default());
        let mut c = controller(transport.clone(), sink.clone(), recorder.clone());

        c.drop_files(vec![SelectedFile::new("invoice.docx", vec![0u8; 1_048_576])])
            .await;
        assert_eq!(c.state().phase, UploadPhase::Uploading);

        let state = c.run_until_settled().await.clone();
        assert_eq!(state.phase, UploadPhase::Done);
        assert_eq!(state.progress, 100);
        assert_eq!(crate::view::status_text(&state), "Done");

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "invoice.pdf");
        assert_eq!(saved[0].1, b"%PDF-1.7 invoice");
        assert_eq!(recorder.saved.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.notices.load(Ordering::SeqCst), 0);
        assert_eq!(c.last_saved(), Some(Path::new("invoice.pdf")));

        let seen = recorder.progress.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert!(seen.contains(&25) && seen.contains(&50));
    }

    #[tokio::test]
    async fn transport_failure_shows_one_notice() {
        let transport = ScriptedTransport::new(vec![vec![
            progress(50, 100),
            TransferEvent::Failed(UploadError::HttpStatus {
                url: "http://x/convert".into(),
                status: 502,
            }),
        ]]);
        let sink = Arc::new(MemorySink::default());
        let recorder = Arc::new(Recorder::default());
        let mut c = controller(transport, sink.clone(), recorder.clone());

        c.select_file(SelectedFile::new("a.txt", vec![1u8; 100])).await;
        let state = c.run_until_settled().await.clone();

        assert_eq!(state.phase, UploadPhase::Failed);
        assert_eq!(state.progress, 0);
        assert_eq!(recorder.notices.load(Ordering::SeqCst), 1);
        assert!(sink.saved.lock().unwrap().is_empty());
        assert!(c.last_error().unwrap().contains("502"));
    }

    #[tokio::test]
    async fn save_failure_counts_as_conversion_failure() {
        let transport =
            ScriptedTransport::new(vec![vec![TransferEvent::Completed(b"%PDF".to_vec())]]);
        let sink = Arc::new(MemorySink {
            fail: true,
            ..Default::default()
        });
        let recorder = Arc::new(Recorder::default());
        let mut c = controller(transport, sink, recorder.clone());

        c.select_file(SelectedFile::new("a.txt", b"hi".to_vec())).await;
        let state = c.run_until_settled().await;

        assert_eq!(state.phase, UploadPhase::Failed);
        assert_eq!(recorder.notices.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multi_file_drop_uploads_first_only() {
        let transport =
            ScriptedTransport::new(vec![vec![TransferEvent::Completed(b"%PDF".to_vec())]]);
        let sink = Arc::new(MemorySink::default());
        let mut c = controller(transport.clone(), sink.clone(), Arc::default());

        c.set_drag_over(true).await;
        assert!(c.state().drag_over);
        c.drop_files(vec![
            SelectedFile::new("first.xlsx", b"1".to_vec()),
            SelectedFile::new("second.xlsx", b"2".to_vec()),
        ])
        .await;
        assert!(!c.state().drag_over);
        c.run_until_settled().await;

        assert_eq!(*transport.started.lock().unwrap(), vec!["first.xlsx"]);
        assert_eq!(sink.saved.lock().unwrap()[0].0, "first.pdf");
    }

    #[tokio::test]
    async fn superseded_attempt_cannot_overwrite_newer_one() {
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        let transport = Arc::new(StallingTransport {
            release: Mutex::new(Some(release_rx)),
        });
        let sink = Arc::new(MemorySink::default());
        let recorder = Arc::new(Recorder::default());
        let mut c = controller(transport, sink.clone(), recorder.clone());

        c.select_file(SelectedFile::new("slow.docx", b"s".to_vec())).await;
        c.select_file(SelectedFile::new("fresh.docx", b"f".to_vec())).await;
        assert_eq!(c.state().attempt, 2);
        // The first transfer was aborted; releasing it must change nothing.
        let _ = release_tx.send(());

        let state = c.run_until_settled().await.clone();
        assert_eq!(state.phase, UploadPhase::Done);
        assert_eq!(state.file.unwrap().name, "fresh.docx");

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0], ("fresh.pdf".to_string(), b"%PDF fresh".to_vec()));
    }

    #[tokio::test]
    async fn stale_queued_events_are_discarded() {
        let transport = ScriptedTransport::new(vec![]);
        let sink = Arc::new(MemorySink::default());
        let recorder = Arc::new(Recorder::default());
        let mut c = controller(transport, sink.clone(), recorder.clone());

        c.select_file(SelectedFile::new("one.txt", b"1".to_vec())).await;
        c.select_file(SelectedFile::new("two.txt", b"2".to_vec())).await;

        c.handle(Event::ResponseReceived {
            attempt: 1,
            body: b"old".to_vec(),
        })
        .await;
        c.handle(Event::AttemptFailed {
            attempt: 1,
            error: UploadError::Internal("old".into()),
        })
        .await;

        assert_eq!(c.state().phase, UploadPhase::Uploading);
        assert!(sink.saved.lock().unwrap().is_empty());
        assert_eq!(recorder.notices.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settled_controller_returns_immediately() {
        let mut c = controller(
            ScriptedTransport::new(vec![]),
            Arc::default(),
            Arc::default(),
        );
        assert_eq!(c.run_until_settled().await.phase, UploadPhase::Idle);
    }
}
