//! CLI binary for edgequake-file2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to `UploadConfig`,
//! renders controller state with indicatif, and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_file2pdf::view::{file_card, progress_bar, status_text};
use edgequake_file2pdf::{
    convert_file, parse_dropped, resolve_path, ControllerState, ConversionReport,
    ProgressCallback, UploadConfig, UploadController, UploadError, UploadObserver, UploadPhase,
    DEFAULT_ENDPOINT,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one progress bar per attempt, a file card when the
/// attempt settles, and the failure notice in red.
struct CliObserver {
    /// Bar of the current attempt, with the attempt id it belongs to.
    bar: Mutex<Option<(u64, ProgressBar)>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn new_bar(state: &ControllerState) -> ProgressBar {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        if let Some(file) = &state.file {
            bar.set_prefix(format!(
                "[{}] {}  {}",
                file.type_label(),
                file.name,
                file.display_size()
            ));
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl UploadObserver for CliObserver {
    fn on_state_change(&self, state: &ControllerState) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());

        match state.phase {
            UploadPhase::Idle => {}
            UploadPhase::Uploading => {
                let stale = slot.as_ref().is_some_and(|(id, _)| *id != state.attempt);
                if stale {
                    if let Some((_, old)) = slot.take() {
                        old.abandon_with_message(dim("superseded"));
                    }
                }
                let (_, bar) = slot.get_or_insert_with(|| (state.attempt, Self::new_bar(state)));
                bar.set_position(u64::from(state.progress));
                bar.set_message(status_text(state));
            }
            UploadPhase::Done | UploadPhase::Failed => {
                if let Some((_, bar)) = slot.take() {
                    bar.finish_and_clear();
                }
                if let Some(card) = file_card(state) {
                    let mark = if state.phase == UploadPhase::Done {
                        green("✔")
                    } else {
                        red("✘")
                    };
                    eprintln!("{mark} {card}");
                }
            }
        }
    }

    fn on_failure_notice(&self, message: &str) {
        eprintln!("{} {}", red("✗"), bold(message));
    }

    fn on_artifact_saved(&self, path: &Path) {
        eprintln!("   {} {}", cyan("→"), bold(&path.display().to_string()));
    }
}

// ── Plain observer (no progress bar) ─────────────────────────────────────────

/// Used with `--no-progress`, `--json` and `--quiet`: prints the failure
/// notice, plus a text bar and file card per settled attempt unless quiet.
struct PlainObserver {
    quiet: bool,
}

impl UploadObserver for PlainObserver {
    fn on_state_change(&self, state: &ControllerState) {
        if self.quiet || !state.phase.is_terminal() {
            return;
        }
        if let Some(card) = file_card(state) {
            eprintln!("{} {}", progress_bar(state.progress, 20), card);
        }
    }

    fn on_failure_notice(&self, message: &str) {
        eprintln!("{} {}", red("✗"), bold(message));
    }

    fn on_artifact_saved(&self, path: &Path) {
        if !self.quiet {
            eprintln!("   {} {}", cyan("→"), bold(&path.display().to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one document (saved as ./invoice.pdf)
  file2pdf invoice.docx

  # Save into a directory, replacing an existing PDF of the same name
  file2pdf --output-dir converted --overwrite report.xlsx

  # Use a different conversion service
  file2pdf --endpoint https://convert.example.com slides.pptx

  # Interactive drop target: drag files onto the terminal window
  file2pdf --interactive

  # JSON report on stdout
  file2pdf --json notes.txt > report.json

DROPPING SEVERAL FILES:
  Only the first file of a set is converted; the rest are ignored with a
  warning. In interactive mode every pasted line is one dropped set.

ENDPOINT CONTRACT:
  POST <endpoint>/convert, multipart/form-data with one part named "file".
  A 2xx response body is saved as <name-before-first-dot>.pdf; anything
  else fails the attempt. Failed attempts are not retried.

ENVIRONMENT VARIABLES:
  FILE2PDF_ENDPOINT     Conversion service base URL
  FILE2PDF_OUTPUT_DIR   Directory for converted PDFs
  FILE2PDF_TIMEOUT      Request timeout in seconds (default: none)
  RUST_LOG              Override log filtering (e.g. edgequake_file2pdf=debug)
"#;

/// Upload documents to a conversion service and save the returned PDF.
#[derive(Parser, Debug)]
#[command(
    name = "file2pdf",
    version,
    about = "Upload documents to a conversion service and save the returned PDF",
    long_about = "Upload a document (any type, any size) to a file-to-PDF conversion \
service, show upload progress, and save the converted PDF next to your other downloads.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert. Treated as one dropped set: only the first is used.
    files: Vec<PathBuf>,

    /// Conversion service base URL.
    #[arg(short, long, env = "FILE2PDF_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory the converted PDF is saved into.
    #[arg(short, long, env = "FILE2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Replace an existing PDF instead of saving as "name (1).pdf".
    #[arg(long, env = "FILE2PDF_OVERWRITE")]
    overwrite: bool,

    /// Request timeout in seconds. Waits indefinitely when omitted.
    #[arg(long, env = "FILE2PDF_TIMEOUT")]
    timeout: Option<u64>,

    /// Read dropped files from stdin, one set per line, until EOF.
    #[arg(short, long)]
    interactive: bool,

    /// Print a JSON report on stdout instead of the summary line.
    #[arg(long, env = "FILE2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "FILE2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FILE2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FILE2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer: ProgressCallback = if show_progress {
        CliObserver::new() as ProgressCallback
    } else {
        Arc::new(PlainObserver {
            quiet: cli.quiet || cli.json,
        }) as ProgressCallback
    };
    let config = build_config(&cli, Some(observer))?;

    if cli.interactive || cli.files.is_empty() {
        return run_interactive(&config, cli.quiet).await;
    }

    // ── One-shot conversion ──────────────────────────────────────────────
    let first = first_of_set(&cli.files).context("No input file given")?;
    let Some(report) = convert_one(first, &config).await? else {
        return Ok(ExitCode::FAILURE);
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  →  {}  ({} bytes, {}ms)",
            green("✔"),
            report.input_name,
            bold(&report.output_path.display().to_string()),
            report.output_size,
            report.duration_ms,
        );
    }

    Ok(ExitCode::SUCCESS)
}

/// Convert one file.
///
/// `Ok(None)` means the attempt failed: the observer has already shown the
/// failure notice and the controller has logged the cause, so nothing more
/// is printed. Errors before the upload starts (missing file, bad config)
/// are returned as-is.
async fn convert_one(path: &Path, config: &UploadConfig) -> Result<Option<ConversionReport>> {
    match convert_file(path, config).await {
        Ok(report) => Ok(Some(report)),
        Err(e @ UploadError::ConversionFailed { .. }) => {
            debug!("{e}");
            Ok(None)
        }
        Err(e) => Err(e).context("Conversion failed"),
    }
}

/// Map CLI args to `UploadConfig`.
fn build_config(cli: &Cli, observer: Option<ProgressCallback>) -> Result<UploadConfig> {
    let mut builder = UploadConfig::builder()
        .endpoint(cli.endpoint.clone())
        .output_dir(cli.output_dir.clone())
        .overwrite(cli.overwrite);

    if let Some(secs) = cli.timeout {
        builder = builder.timeout_secs(secs);
    }
    if let Some(cb) = observer {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// First path of a dropped set, warning about the ones that are ignored.
fn first_of_set(paths: &[PathBuf]) -> Option<&PathBuf> {
    if paths.len() > 1 {
        eprintln!(
            "{} {} additional file(s) ignored; only '{}' is converted",
            cyan("⚠"),
            paths.len() - 1,
            paths[0].display()
        );
    }
    paths.first()
}

/// Treat stdin as a drop target until EOF.
///
/// A new drop while an upload is in flight cancels that upload and starts
/// over with the new file.
async fn run_interactive(config: &UploadConfig, quiet: bool) -> Result<ExitCode> {
    let mut controller =
        UploadController::from_config(config).context("Failed to set up upload client")?;

    if !quiet {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold("Drag and drop or type the path of a file to convert"),
            dim(&format!("({} · Ctrl-D to quit)", config.convert_url()))
        );
    }

    let phase = drive_drops(&mut controller, BufReader::new(tokio::io::stdin())).await?;
    Ok(if phase == UploadPhase::Failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Feed each line of `input` to `controller` as one dropped set, applying
/// transfer events as they arrive. After EOF, waits for the current attempt
/// to settle and returns its phase.
async fn drive_drops<R>(controller: &mut UploadController, input: R) -> Result<UploadPhase>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(text) = line.context("Failed to read dropped files")? else {
                    break;
                };
                let paths = parse_dropped(&text);
                let Some(first) = first_of_set(&paths) else {
                    continue;
                };
                match resolve_path(first).await {
                    Ok(file) => controller.drop_files(vec![file]).await,
                    Err(e) => eprintln!("{} {}", red("✗"), e),
                }
            }
            Some(event) = controller.next_event() => {
                controller.handle(event).await;
            }
        }
    }

    Ok(controller.run_until_settled().await.phase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_file2pdf::{DirectorySink, SelectedFile, TransferEvent, TransferStream, Transport};
    use futures::stream::{self, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["file2pdf", "invoice.docx"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("invoice.docx")]);
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(cli.timeout.is_none());
        let config = build_config(&cli, None).unwrap();
        assert!(config.convert_url().ends_with("/convert"));
    }

    #[test]
    fn first_of_set_picks_first() {
        let paths = vec![PathBuf::from("a.docx"), PathBuf::from("b.docx")];
        assert_eq!(first_of_set(&paths), Some(&PathBuf::from("a.docx")));
        assert_eq!(first_of_set(&[]), None);
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let cli = Cli::try_parse_from(["file2pdf", "--endpoint", "localhost:5000", "x"]).unwrap();
        assert!(build_config(&cli, None).is_err());
    }

    #[derive(Default)]
    struct Notices {
        count: AtomicUsize,
        settled: Mutex<Vec<ControllerState>>,
    }

    impl UploadObserver for Notices {
        fn on_state_change(&self, state: &ControllerState) {
            if state.phase.is_terminal() {
                self.settled.lock().unwrap().push(state.clone());
            }
        }

        fn on_failure_notice(&self, _message: &str) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn failed_conversion_shows_one_notice_and_no_error_chain() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("invoice.docx");
        std::fs::write(&input, b"docx").unwrap();

        let notices = Arc::new(Notices::default());
        let config = UploadConfig::builder()
            .endpoint(closed_port_url())
            .output_dir(dir.path())
            .progress_callback(notices.clone() as ProgressCallback)
            .build()
            .unwrap();

        let outcome = convert_one(&input, &config).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(notices.count.load(Ordering::SeqCst), 1);
        let settled = notices.settled.lock().unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].phase, UploadPhase::Failed);
        assert_eq!(settled[0].progress, 0);
    }

    #[tokio::test]
    async fn missing_input_is_an_error_without_notice() {
        let dir = tempfile::tempdir().unwrap();
        let notices = Arc::new(Notices::default());
        let config = UploadConfig::builder()
            .endpoint(closed_port_url())
            .output_dir(dir.path())
            .progress_callback(notices.clone() as ProgressCallback)
            .build()
            .unwrap();

        let err = convert_one(&dir.path().join("nope.docx"), &config)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not found"), "{err:#}");
        assert_eq!(notices.count.load(Ordering::SeqCst), 0);
    }

    /// Holds the first attempt open after one tick; later attempts succeed.
    #[derive(Default)]
    struct HoldFirstTransport {
        started: Mutex<Vec<String>>,
    }

    impl Transport for HoldFirstTransport {
        fn start(&self, file: Arc<SelectedFile>) -> TransferStream {
            let mut started = self.started.lock().unwrap();
            started.push(file.name().to_string());
            let total = Some(file.size_bytes());
            if started.len() == 1 {
                TransferStream::new(
                    stream::iter(vec![TransferEvent::Progress { sent: 1, total }])
                        .chain(stream::pending()),
                )
            } else {
                TransferStream::new(stream::iter(vec![
                    TransferEvent::Progress {
                        sent: file.size_bytes(),
                        total,
                    },
                    TransferEvent::Completed(b"%PDF-1.7".to_vec()),
                ]))
            }
        }
    }

    #[tokio::test]
    async fn second_drop_supersedes_first_silently() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.docx");
        let b = dir.path().join("b.docx");
        let c = dir.path().join("c.txt");
        for path in [&a, &b, &c] {
            std::fs::write(path, b"payload").unwrap();
        }
        let input = format!("'{}' '{}'\n'{}'\n", a.display(), b.display(), c.display());

        let transport = Arc::new(HoldFirstTransport::default());
        let notices = Arc::new(Notices::default());
        let mut controller = UploadController::new(
            transport.clone(),
            Arc::new(DirectorySink::new(out.path(), false)),
            Some(notices.clone() as ProgressCallback),
        );

        let phase = drive_drops(&mut controller, input.as_bytes()).await.unwrap();

        assert_eq!(phase, UploadPhase::Done);
        assert_eq!(*transport.started.lock().unwrap(), vec!["a.docx", "c.txt"]);
        assert_eq!(notices.count.load(Ordering::SeqCst), 0);

        let settled = notices.settled.lock().unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].file.as_ref().unwrap().name, "c.txt");
        assert!(out.path().join("c.pdf").exists());
        assert!(!out.path().join("a.pdf").exists());
        assert!(!out.path().join("b.pdf").exists());
    }
}
