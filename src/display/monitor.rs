use async_trait::async_trait;
use console::Term;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::clock::{Clock, SystemClock};
use crate::errors::StatusError;
use crate::pipeline::RunSnapshot;
use crate::store::{read_snapshot, StatusStore};
use super::renderer::{render_snapshot, RenderOptions};

pub const DEFAULT_REFRESH: Duration = Duration::from_secs(2);
pub const MIN_REFRESH: Duration = Duration::from_millis(100);

/// Where the monitor reads snapshots from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<RunSnapshot, StatusError>;

    /// Revision notifications, for sources that can push them. Sources
    /// without one are only polled.
    fn changes(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

#[async_trait]
impl SnapshotSource for StatusStore {
    async fn fetch(&self) -> Result<RunSnapshot, StatusError> {
        Ok(self.snapshot().await)
    }

    fn changes(&self) -> Option<watch::Receiver<u64>> {
        Some(self.subscribe())
    }
}

/// A JSON mirror written by another process.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFile {
    async fn fetch(&self) -> Result<RunSnapshot, StatusError> {
        read_snapshot(&self.path).await
    }
}

/// Receives rendered frames.
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &str) -> io::Result<()>;
}

/// Writes frames to stdout, redrawing the whole screen each time when
/// stdout is a terminal.
pub struct TermSink {
    term: Term,
    clear: bool,
}

impl TermSink {
    pub fn stdout() -> Self {
        Self { term: Term::stdout(), clear: true }
    }

    /// Append frames instead of redrawing.
    pub fn without_clearing(mut self) -> Self {
        self.clear = false;
        self
    }
}

impl FrameSink for TermSink {
    fn write_frame(&mut self, frame: &str) -> io::Result<()> {
        if self.clear && self.term.is_term() {
            self.term.clear_screen()?;
        }
        self.term.write_line(frame)
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    frames: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn last(&self) -> Option<&str> {
        self.frames.last().map(String::as_str)
    }
}

impl FrameSink for BufferSink {
    fn write_frame(&mut self, frame: &str) -> io::Result<()> {
        self.frames.push(frame.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    RunFinished,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub refresh: Duration,
    pub render: RenderOptions,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_REFRESH,
            render: RenderOptions::default(),
        }
    }
}

/// Periodically renders a snapshot source into a sink until the run
/// finishes or the token is cancelled.
pub struct Monitor<S, W> {
    source: S,
    sink: W,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl<S: SnapshotSource, W: FrameSink> Monitor<S, W> {
    pub fn new(source: S, sink: W, config: MonitorConfig) -> Self {
        Self::with_clock(source, sink, config, Arc::new(SystemClock))
    }

    /// Refresh intervals below `MIN_REFRESH` are raised to it.
    pub fn with_clock(source: S, sink: W, mut config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        config.refresh = config.refresh.max(MIN_REFRESH);
        Self { source, sink, clock, config }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Fetch, render and emit one frame. Returns whether the run drawn has
    /// finished. Fetch and write errors are logged and the frame skipped.
    pub async fn draw(&mut self) -> bool {
        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to fetch snapshot");
                return false;
            }
        };
        let frame = render_snapshot(&snapshot, self.clock.now(), &self.config.render);
        if let Err(e) = self.sink.write_frame(&frame) {
            warn!(error = %e, "Failed to write frame");
        }
        snapshot.is_finished()
    }

    /// Redraw on every refresh tick and on every revision the source
    /// announces. Cancellation draws one last frame before returning.
    pub async fn run(&mut self, cancel: CancellationToken) -> MonitorExit {
        let mut changes = self.source.changes();
        let mut ticker = tokio::time::interval(self.config.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(refresh_ms = self.config.refresh.as_millis() as u64, "Monitor started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.draw().await;
                    debug!("Monitor cancelled");
                    return MonitorExit::Cancelled;
                }
                _ = ticker.tick() => {}
                _ = next_change(&mut changes) => {}
            }
            if self.draw().await {
                info!("Run finished, monitor stopping");
                return MonitorExit::RunFinished;
            }
        }
    }
}

/// Resolves on the next announced revision. Never resolves once the
/// sender is gone, leaving the ticker in charge.
async fn next_change(changes: &mut Option<watch::Receiver<u64>>) {
    let Some(rx) = changes.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *changes = None;
    }
}
