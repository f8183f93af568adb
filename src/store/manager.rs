use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::clock::{Clock, SystemClock};
use crate::errors::{EntityKind, StatusError};
use crate::pipeline::{Applied, RunModel, RunSnapshot, StageConfig};
use super::persist::SnapshotWriter;

/// Identifies the run a `start_run` call created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

/// Shared owner of the one live run.
///
/// Cloning is cheap; every clone talks to the same run. All mutations and
/// snapshot reads go through one lock, and nothing slow happens while it is
/// held: the optional JSON mirror is written after the lock is released.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
    revisions: watch::Sender<u64>,
    mirror: Option<SnapshotWriter>,
}

#[derive(Default)]
struct StoreState {
    run: Option<RunModel>,
    revision: u64,
}

impl StoreState {
    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            revision: self.revision,
            run: self.run.as_ref().map(RunModel::to_view),
        }
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self::with_options(Arc::new(SystemClock), None)
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, None)
    }

    /// `mirror` is the JSON file snapshots are copied to after every change.
    pub fn with_options(clock: Arc<dyn Clock>, mirror: Option<PathBuf>) -> Self {
        let (revisions, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                clock,
                revisions,
                mirror: mirror.map(SnapshotWriter::new),
            }),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Receives the store's revision number after every accepted change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revisions.subscribe()
    }

    /// Start tracking a new run with a generated id.
    pub async fn start_run(
        &self,
        request: &str,
        stages: &[StageConfig],
    ) -> Result<RunHandle, StatusError> {
        self.start_run_with_id(request, None, stages).await
    }

    /// Start tracking a new run. Fails with `AlreadyStarted` while a previous
    /// run is still unfinished; a finished run is replaced.
    pub async fn start_run_with_id(
        &self,
        request: &str,
        run_id: Option<&str>,
        stages: &[StageConfig],
    ) -> Result<RunHandle, StatusError> {
        let started = {
            let mut state = self.inner.state.lock().await;
            let unfinished = state
                .run
                .as_ref()
                .filter(|run| !run.is_finished())
                .map(|run| run.run_id().to_string());
            match unfinished {
                Some(run_id) => Err(StatusError::AlreadyStarted { run_id }),
                None => {
                    let now = self.inner.clock.now();
                    let run_id = run_id.map(str::to_string).unwrap_or_else(|| generate_run_id(now));
                    RunModel::new(request, &run_id, now, stages).map(|model| {
                        let handle = RunHandle {
                            run_id: model.run_id().to_string(),
                            started_at: model.started_at(),
                        };
                        state.run = Some(model);
                        state.revision += 1;
                        (handle, state.revision, self.mirror_copy(&state))
                    })
                }
            }
        };
        let (handle, revision, mirrored) = started.map_err(|e| rejected("start_run", e))?;

        info!(
            run_id = %handle.run_id,
            stages = stages.len(),
            agents = stages.iter().map(|s| s.agents.len()).sum::<usize>(),
            "Run started"
        );
        self.publish(revision, mirrored).await;
        Ok(handle)
    }

    pub async fn begin_stage(&self, key: &str) -> Result<Applied, StatusError> {
        let applied = self.mutate("begin_stage", |run, now| run.begin_stage(key, now)).await?;
        info!(stage = key, "Stage started");
        Ok(applied)
    }

    pub async fn complete_stage(&self, key: &str) -> Result<Applied, StatusError> {
        let applied = self.mutate("complete_stage", |run, now| run.complete_stage(key, now)).await?;
        info!(stage = key, "Stage completed");
        Ok(applied)
    }

    pub async fn fail_stage(&self, key: &str, reason: &str) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("fail_stage", |run, now| run.fail_stage(key, reason, now))
            .await?;
        warn!(stage = key, reason, "Stage failed");
        Ok(applied)
    }

    pub async fn agent_started(&self, name: &str, message: &str) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("agent_started", |run, now| run.agent_started(name, message, now))
            .await?;
        debug!(agent = name, message, "Agent active");
        Ok(applied)
    }

    /// `duration_ms` is the collaborator's own measurement; it is only used
    /// when the agent never reported a start.
    pub async fn agent_completed(
        &self,
        name: &str,
        duration_ms: Option<u64>,
        preview: &str,
    ) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("agent_completed", |run, now| {
                run.agent_completed(name, duration_ms, preview, now)
            })
            .await?;
        if applied == Applied::Repeated {
            debug!(agent = name, "Duplicate completion report");
        } else {
            info!(agent = name, "Agent completed");
        }
        Ok(applied)
    }

    pub async fn agent_failed(&self, name: &str, error: &str) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("agent_failed", |run, now| run.agent_failed(name, error, now))
            .await?;
        warn!(agent = name, error, "Agent failed");
        Ok(applied)
    }

    pub async fn agent_waiting(&self, name: &str, message: &str) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("agent_waiting", |run, _| run.agent_waiting(name, message))
            .await?;
        debug!(agent = name, message, "Agent waiting");
        Ok(applied)
    }

    /// Record the run's overall outcome and end time.
    pub async fn finish_run(
        &self,
        success: bool,
        summary: Option<&str>,
    ) -> Result<Applied, StatusError> {
        let applied = self
            .mutate("finish_run", |run, now| run.finish(success, summary, now))
            .await?;
        if applied == Applied::Changed {
            info!(success, "Run finished");
        }
        Ok(applied)
    }

    /// Deep copy of the current state. Never fails: a store without a run
    /// returns the empty snapshot.
    pub async fn snapshot(&self) -> RunSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    async fn mutate<F>(&self, operation: &'static str, apply: F) -> Result<Applied, StatusError>
    where
        F: FnOnce(&mut RunModel, DateTime<Utc>) -> Result<Applied, StatusError>,
    {
        let (applied, revision, mirrored) = {
            let mut state = self.inner.state.lock().await;
            let now = self.inner.clock.now();
            let result = match state.run.as_mut() {
                None => Err(StatusError::not_found(EntityKind::Run, "current")),
                Some(run) => apply(run, now),
            };
            match result {
                Ok(applied) => {
                    state.revision += 1;
                    (applied, state.revision, self.mirror_copy(&state))
                }
                Err(e) => {
                    drop(state);
                    return Err(rejected(operation, e));
                }
            }
        };

        self.publish(revision, mirrored).await;
        Ok(applied)
    }

    fn mirror_copy(&self, state: &StoreState) -> Option<RunSnapshot> {
        self.inner.mirror.as_ref().map(|_| state.snapshot())
    }

    /// Announce a new revision and mirror it. Mirror failures are logged and
    /// dropped; the in-memory change has already happened.
    async fn publish(&self, revision: u64, mirrored: Option<RunSnapshot>) {
        self.inner.revisions.send_replace(revision);

        if let (Some(writer), Some(snapshot)) = (&self.inner.mirror, mirrored) {
            if let Err(e) = writer.write(&snapshot).await {
                warn!(
                    path = %writer.path().display(),
                    revision,
                    error = %e,
                    "Failed to mirror status snapshot"
                );
            }
        }
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(operation: &'static str, e: StatusError) -> StatusError {
    let class = e.classify();
    warn!(
        operation,
        error_type = class.error_type,
        error = %e,
        "Rejected status update"
    );
    e
}

fn generate_run_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("pip_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}
