//! Live watch runtime
//!
//! Wires a `notify` watcher over the transcript root to a single tokio task
//! that owns the [`LogTailer`] and the [`Detector`]. The watcher callback runs
//! on notify's own thread and only forwards paths into a channel; all
//! detector state is touched by the task alone.
//!
//! ```text
//! notify thread ──FileEvent──► detector task ──PetEvent──► receiver
//!                                  ▲
//!                     sleep_until(next_deadline)
//! ```
//!
//! A root that does not exist yet is polled for. Once it appears the
//! recursive watch is armed and every transcript already inside it is read
//! from the start, since none of it predates the session.

use crate::config::Config;
use crate::detect::Detector;
use crate::error::Result;
use crate::ingest::{discover_transcripts, is_transcript, LogTailer};
use crate::stats::StatsSummary;
use crate::types::PetEvent;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often a missing transcript root is looked for.
const ROOT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Transcript changes forwarded from the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

impl FileEvent {
    fn from_notify(kind: &EventKind, path: PathBuf) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileEvent::Added(path)),
            EventKind::Modify(_) => Some(FileEvent::Changed(path)),
            EventKind::Remove(_) => Some(FileEvent::Removed(path)),
            _ => None,
        }
    }
}

/// A running watch session.
///
/// Dropping the handle without calling [`WatchHandle::stop`] also ends the
/// session, but nothing waits for the task to finish.
pub struct WatchHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<StatsSummary>,
    watching: Arc<AtomicBool>,
    root: PathBuf,
}

impl WatchHandle {
    /// Directory being watched, resolved to an absolute path when it exists.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root exists and is actually being watched.
    ///
    /// Turns true later if the root is created after the session started.
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::Acquire)
    }

    /// Stop watching, cancel every timer and wait for the detector task.
    ///
    /// Once this returns no further event is sent.
    pub async fn stop(mut self) -> Result<StatsSummary> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let summary = self.task.await?;
        info!(root = %self.root.display(), tool_calls = summary.tool_calls, "Watch stopped");
        Ok(summary)
    }
}

/// The watch side of a session: the root and, once armed, its watcher.
struct TranscriptSource {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    fs_tx: mpsc::UnboundedSender<FileEvent>,
    watching: Arc<AtomicBool>,
}

impl TranscriptSource {
    fn is_armed(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start the recursive watch on the (now existing) root.
    fn arm(&mut self) -> Result<()> {
        self.root = resolve_root(&self.root);

        let fs_tx = self.fs_tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for path in event.paths.into_iter().filter(|p| is_transcript(p)) {
                        if let Some(file_event) = FileEvent::from_notify(&event.kind, path) {
                            // Receiver gone means the session is shutting down
                            let _ = fs_tx.send(file_event);
                        }
                    }
                }
                Err(e) => error!(error = %e, "File watcher error"),
            },
        )?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        self.watcher = Some(watcher);
        self.watching.store(true, Ordering::Release);
        Ok(())
    }
}

/// Absolute, symlink-free form of `root`, which is how notify reports paths.
///
/// Falls back to the path as given when it cannot be resolved.
fn resolve_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Start watching `root` for transcript activity.
///
/// Transcripts already present are registered at their current size so only
/// new lines count. A missing root is logged and polled for; until it
/// appears the session runs with timers only.
///
/// Must be called from within a tokio runtime.
pub fn spawn(
    root: &Path,
    config: &Config,
) -> Result<(WatchHandle, mpsc::UnboundedReceiver<PetEvent>)> {
    let (fs_tx, fs_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let watching = Arc::new(AtomicBool::new(false));

    let mut tailer = LogTailer::new();
    let mut source = TranscriptSource {
        root: root.to_path_buf(),
        watcher: None,
        fs_tx,
        watching: Arc::clone(&watching),
    };

    if root.exists() {
        source.root = resolve_root(root);
        let primed = tailer.prime(&source.root);
        source.arm()?;
        info!(root = %source.root.display(), transcripts = primed, "Watching transcripts");
    } else {
        warn!(root = %root.display(), "Transcript directory does not exist; waiting for it");
    }

    let now = now();
    let mut detector = Detector::new(config, now);
    detector.start(now);

    let handle_root = source.root.clone();
    let task = tokio::spawn(run(detector, tailer, source, fs_rx, shutdown_rx, events_tx));

    Ok((
        WatchHandle {
            shutdown: Some(shutdown_tx),
            task,
            watching,
            root: handle_root,
        },
        events_rx,
    ))
}

async fn run(
    mut detector: Detector,
    mut tailer: LogTailer,
    mut source: TranscriptSource,
    mut fs_rx: mpsc::UnboundedReceiver<FileEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
    events_tx: mpsc::UnboundedSender<PetEvent>,
) -> StatsSummary {
    let mut root_poll = tokio::time::interval(ROOT_POLL_INTERVAL);
    root_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let deadline = detector.next_deadline();

        tokio::select! {
            biased;

            _ = &mut shutdown_rx => break,

            Some(file_event) = fs_rx.recv() => {
                handle_file_event(&mut detector, &mut tailer, file_event);
            }

            _ = sleep_until(deadline) => {
                detector.tick(now());
            }

            _ = root_poll.tick(), if !source.is_armed() => {
                if source.root.exists() {
                    adopt_root(&mut source, &mut detector, &mut tailer);
                }
            }
        }

        for event in detector.drain_events() {
            debug!(event = event.name(), "Emitting event");
            // A dropped receiver only means nobody is listening
            let _ = events_tx.send(event);
        }
    }

    let summary = detector.summary(now());
    detector.stop();
    drop(source);
    debug!(files = tailer.len(), "Releasing tracked transcripts");
    tailer.clear();
    summary
}

/// The root showed up after the session started: watch it and read what
/// was already written into it.
fn adopt_root(source: &mut TranscriptSource, detector: &mut Detector, tailer: &mut LogTailer) {
    if let Err(e) = source.arm() {
        warn!(root = %source.root.display(), error = %e, "Cannot watch transcript directory yet");
        return;
    }
    info!(root = %source.root.display(), "Transcript directory appeared; watching");

    let now = now();
    for path in discover_transcripts(&source.root) {
        for line in tailer.on_file_changed(&path) {
            detector.process_line(&line, now);
        }
    }
}

fn handle_file_event(detector: &mut Detector, tailer: &mut LogTailer, event: FileEvent) {
    match event {
        FileEvent::Added(path) => tailer.on_file_added(&path),
        FileEvent::Changed(path) => {
            let lines = tailer.on_file_changed(&path);
            if lines.is_empty() {
                return;
            }
            debug!(path = %path.display(), lines = lines.len(), "New transcript lines");
            let now = now();
            for line in &lines {
                detector.process_line(line, now);
            }
        }
        FileEvent::Removed(path) => tailer.on_file_removed(&path),
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// Current time on tokio's clock.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
