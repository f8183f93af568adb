use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::errors::{EntityKind, StatusError};
use crate::utils::truncation::{truncate_message, truncate_preview};
use super::phase::{validate_topology, StageConfig};
use super::snapshot::{AgentView, RunView, StageView};

pub const COMPLETED_MESSAGE: &str = "Completed successfully";
const MISSING_ERROR_MESSAGE: &str = "unspecified error";

/// Status shared by stages and agents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Active,
    Waiting,
    Completed,
    Failed,
}

impl StatusKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a stage or agent. Timestamps only exist in the states where
/// they mean something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Pending,
    Waiting {
        start: Option<DateTime<Utc>>,
    },
    Active {
        start: DateTime<Utc>,
    },
    Completed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_ms: u64,
    },
    Failed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_ms: u64,
        error: String,
    },
}

/// Whether a transition changed the status or re-applied the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Repeated,
}

/// Why a lifecycle refused a transition. The lifecycle is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyTerminal { recorded: StatusKind },
    Invalid { from: StatusKind },
}

impl Lifecycle {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Pending => StatusKind::Pending,
            Self::Waiting { .. } => StatusKind::Waiting,
            Self::Active { .. } => StatusKind::Active,
            Self::Completed { .. } => StatusKind::Completed,
            Self::Failed { .. } => StatusKind::Failed,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Waiting { start } => *start,
            Self::Active { start }
            | Self::Completed { start, .. }
            | Self::Failed { start, .. } => Some(*start),
        }
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Completed { end, .. } | Self::Failed { end, .. } => Some(*end),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            Self::Completed { duration_ms, .. } | Self::Failed { duration_ms, .. } => {
                Some(*duration_ms)
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// PENDING/WAITING -> ACTIVE. The first start wins; repeats are no-ops.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<Applied, Rejection> {
        match self {
            Self::Pending => {
                *self = Self::Active { start: now };
                Ok(Applied::Changed)
            }
            Self::Waiting { start } => {
                *self = Self::Active { start: start.unwrap_or(now) };
                Ok(Applied::Changed)
            }
            Self::Active { .. } => Ok(Applied::Repeated),
            Self::Completed { .. } | Self::Failed { .. } => {
                Err(Rejection::Invalid { from: self.kind() })
            }
        }
    }

    /// PENDING/ACTIVE -> WAITING. A recorded start survives the wait.
    pub fn wait(&mut self) -> Result<Applied, Rejection> {
        match self {
            Self::Pending => {
                *self = Self::Waiting { start: None };
                Ok(Applied::Changed)
            }
            Self::Active { start } => {
                *self = Self::Waiting { start: Some(*start) };
                Ok(Applied::Changed)
            }
            Self::Waiting { .. } => Ok(Applied::Repeated),
            Self::Completed { .. } | Self::Failed { .. } => {
                Err(Rejection::Invalid { from: self.kind() })
            }
        }
    }

    /// PENDING/ACTIVE -> COMPLETED.
    ///
    /// `reported_ms` is only used to backfill the start of an entity that
    /// never reported one; a measured start always wins.
    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        reported_ms: Option<u64>,
    ) -> Result<Applied, Rejection> {
        let start = match self {
            Self::Completed { .. } => return Ok(Applied::Repeated),
            Self::Failed { .. } => {
                return Err(Rejection::AlreadyTerminal { recorded: StatusKind::Failed })
            }
            Self::Waiting { .. } => return Err(Rejection::Invalid { from: StatusKind::Waiting }),
            Self::Pending => backfilled_start(now, reported_ms),
            Self::Active { start } => *start,
        };
        let (start, end, duration_ms) = close_span(start, now);
        *self = Self::Completed { start, end, duration_ms };
        Ok(Applied::Changed)
    }

    /// Any non-terminal state -> FAILED. A repeated failure refreshes the
    /// recorded error and keeps the original end time.
    pub fn fail(&mut self, now: DateTime<Utc>, error: String) -> Result<Applied, Rejection> {
        let start = match self {
            Self::Failed { error: recorded, .. } => {
                *recorded = error;
                return Ok(Applied::Repeated);
            }
            Self::Completed { .. } => {
                return Err(Rejection::AlreadyTerminal { recorded: StatusKind::Completed })
            }
            Self::Pending => now,
            Self::Waiting { start } => start.unwrap_or(now),
            Self::Active { start } => *start,
        };
        let (start, end, duration_ms) = close_span(start, now);
        *self = Self::Failed { start, end, duration_ms, error };
        Ok(Applied::Changed)
    }
}

fn backfilled_start(end: DateTime<Utc>, reported_ms: Option<u64>) -> DateTime<Utc> {
    reported_ms
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(|ms| end.checked_sub_signed(Duration::milliseconds(ms)))
        .unwrap_or(end)
}

/// Fix the end of a span. The end never precedes the start, even if the
/// clock stepped backwards.
fn close_span(start: DateTime<Utc>, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>, u64) {
    let end = now.max(start);
    let duration_ms = u64::try_from((end - start).num_milliseconds()).unwrap_or(0);
    (start, end, duration_ms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    #[default]
    Unset,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(usize);

#[derive(Debug, Clone)]
pub struct StageEntry {
    pub key: String,
    pub display_name: String,
    pub optional: bool,
    pub lifecycle: Lifecycle,
    pub agents: Vec<AgentId>,
}

#[derive(Debug, Clone)]
pub struct AgentEntry {
    pub name: String,
    pub stage: StageId,
    pub lifecycle: Lifecycle,
    pub message: String,
    pub preview: String,
}

/// The live state of one run. Stages and agents sit in flat tables owned by
/// the run; everything else refers to them by id.
#[derive(Debug, Clone)]
pub struct RunModel {
    request: String,
    run_id: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    outcome: RunOutcome,
    summary: Option<String>,
    current_stage: Option<StageId>,
    stages: Vec<StageEntry>,
    agents: Vec<AgentEntry>,
    stage_lookup: HashMap<String, StageId>,
    agent_lookup: HashMap<String, AgentId>,
}

impl RunModel {
    pub fn new(
        request: &str,
        run_id: &str,
        started_at: DateTime<Utc>,
        topology: &[StageConfig],
    ) -> Result<Self, StatusError> {
        validate_topology(topology)?;

        let mut stages = Vec::with_capacity(topology.len());
        let mut agents = Vec::new();
        let mut stage_lookup = HashMap::new();
        let mut agent_lookup = HashMap::new();

        for config in topology {
            let stage_id = StageId(stages.len());
            let mut agent_ids = Vec::with_capacity(config.agents.len());
            for name in &config.agents {
                let agent_id = AgentId(agents.len());
                agents.push(AgentEntry {
                    name: name.clone(),
                    stage: stage_id,
                    lifecycle: Lifecycle::Pending,
                    message: String::new(),
                    preview: String::new(),
                });
                agent_lookup.insert(name.clone(), agent_id);
                agent_ids.push(agent_id);
            }
            stage_lookup.insert(config.key.clone(), stage_id);
            stages.push(StageEntry {
                key: config.key.clone(),
                display_name: config.display_name.clone(),
                optional: config.optional,
                lifecycle: Lifecycle::Pending,
                agents: agent_ids,
            });
        }

        Ok(Self {
            request: request.to_string(),
            run_id: run_id.to_string(),
            started_at,
            ended_at: None,
            outcome: RunOutcome::Unset,
            summary: None,
            current_stage: None,
            stages,
            agents,
            stage_lookup,
            agent_lookup,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != RunOutcome::Unset
    }

    pub fn stage_id(&self, key: &str) -> Result<StageId, StatusError> {
        self.stage_lookup
            .get(key)
            .copied()
            .ok_or_else(|| StatusError::not_found(EntityKind::Stage, key))
    }

    pub fn agent_id(&self, name: &str) -> Result<AgentId, StatusError> {
        self.agent_lookup
            .get(name)
            .copied()
            .ok_or_else(|| StatusError::not_found(EntityKind::Agent, name))
    }

    pub fn stage(&self, id: StageId) -> &StageEntry {
        &self.stages[id.0]
    }

    pub fn agent(&self, id: AgentId) -> &AgentEntry {
        &self.agents[id.0]
    }

    pub fn total_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn completed_agents(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.lifecycle.kind() == StatusKind::Completed)
            .count()
    }

    pub fn begin_stage(&mut self, key: &str, now: DateTime<Utc>) -> Result<Applied, StatusError> {
        let id = self.stage_id(key)?;
        let applied = self.with_stage(id, |lifecycle| lifecycle.activate(now), StatusKind::Active)?;
        self.current_stage = Some(id);
        Ok(applied)
    }

    pub fn complete_stage(&mut self, key: &str, now: DateTime<Utc>) -> Result<Applied, StatusError> {
        let id = self.stage_id(key)?;
        self.with_stage(id, |lifecycle| lifecycle.complete(now, None), StatusKind::Completed)
    }

    pub fn fail_stage(
        &mut self,
        key: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Applied, StatusError> {
        let id = self.stage_id(key)?;
        let reason = error_text(reason);
        self.with_stage(id, |lifecycle| lifecycle.fail(now, reason), StatusKind::Failed)
    }

    pub fn agent_started(
        &mut self,
        name: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Applied, StatusError> {
        let id = self.agent_id(name)?;
        let applied = self.with_agent(id, |lifecycle| lifecycle.activate(now), StatusKind::Active)?;
        let agent = &mut self.agents[id.0];
        agent.message = truncate_message(message);
        self.current_stage = Some(agent.stage);
        Ok(applied)
    }

    pub fn agent_waiting(&mut self, name: &str, message: &str) -> Result<Applied, StatusError> {
        let id = self.agent_id(name)?;
        let applied = self.with_agent(id, |lifecycle| lifecycle.wait(), StatusKind::Waiting)?;
        let agent = &mut self.agents[id.0];
        agent.message = truncate_message(message);
        self.current_stage = Some(agent.stage);
        Ok(applied)
    }

    pub fn agent_completed(
        &mut self,
        name: &str,
        reported_ms: Option<u64>,
        preview: &str,
        now: DateTime<Utc>,
    ) -> Result<Applied, StatusError> {
        let id = self.agent_id(name)?;
        let applied = self.with_agent(
            id,
            |lifecycle| lifecycle.complete(now, reported_ms),
            StatusKind::Completed,
        )?;
        let agent = &mut self.agents[id.0];
        agent.message = COMPLETED_MESSAGE.to_string();
        if applied == Applied::Changed || !preview.trim().is_empty() {
            agent.preview = truncate_preview(preview);
        }
        Ok(applied)
    }

    pub fn agent_failed(
        &mut self,
        name: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<Applied, StatusError> {
        let id = self.agent_id(name)?;
        let error = error_text(error);
        let message = error.clone();
        let applied = self.with_agent(id, |lifecycle| lifecycle.fail(now, error), StatusKind::Failed)?;
        self.agents[id.0].message = message;
        Ok(applied)
    }

    /// Record the run's outcome. Repeating the same outcome only refreshes
    /// the summary.
    pub fn finish(
        &mut self,
        success: bool,
        summary: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Applied, StatusError> {
        let outcome = if success { RunOutcome::Succeeded } else { RunOutcome::Failed };
        let applied = match self.outcome {
            RunOutcome::Unset => {
                self.outcome = outcome;
                self.ended_at = Some(now.max(self.started_at));
                Applied::Changed
            }
            recorded if recorded == outcome => Applied::Repeated,
            recorded => {
                return Err(StatusError::AlreadyTerminal {
                    kind: EntityKind::Run,
                    key: self.run_id.clone(),
                    recorded: outcome_status(recorded),
                    attempted: outcome_status(outcome),
                })
            }
        };
        if let Some(summary) = summary {
            self.summary = Some(truncate_message(summary));
        }
        Ok(applied)
    }

    /// Deep copy of the run for readers outside the lock.
    pub fn to_view(&self) -> RunView {
        RunView {
            request: self.request.clone(),
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            outcome: self.outcome,
            summary: self.summary.clone(),
            current_stage: self.current_stage.map(|id| self.stage(id).key.clone()),
            stages: self
                .stages
                .iter()
                .map(|stage| StageView {
                    key: stage.key.clone(),
                    display_name: stage.display_name.clone(),
                    optional: stage.optional,
                    status: stage.lifecycle.kind(),
                    started_at: stage.lifecycle.start_time(),
                    ended_at: stage.lifecycle.end_time(),
                    duration_ms: stage.lifecycle.duration_ms(),
                    error: stage.lifecycle.error().map(str::to_string),
                    agents: stage.agents.iter().map(|id| self.agent_view(*id)).collect(),
                })
                .collect(),
        }
    }

    fn agent_view(&self, id: AgentId) -> AgentView {
        let agent = self.agent(id);
        AgentView {
            name: agent.name.clone(),
            status: agent.lifecycle.kind(),
            started_at: agent.lifecycle.start_time(),
            ended_at: agent.lifecycle.end_time(),
            duration_ms: agent.lifecycle.duration_ms(),
            message: agent.message.clone(),
            preview: agent.preview.clone(),
        }
    }

    fn with_stage<F>(&mut self, id: StageId, apply: F, target: StatusKind) -> Result<Applied, StatusError>
    where
        F: FnOnce(&mut Lifecycle) -> Result<Applied, Rejection>,
    {
        let stage = &mut self.stages[id.0];
        apply(&mut stage.lifecycle)
            .map_err(|rejection| rejection_error(rejection, EntityKind::Stage, &stage.key, target))
    }

    fn with_agent<F>(&mut self, id: AgentId, apply: F, target: StatusKind) -> Result<Applied, StatusError>
    where
        F: FnOnce(&mut Lifecycle) -> Result<Applied, Rejection>,
    {
        let agent = &mut self.agents[id.0];
        apply(&mut agent.lifecycle)
            .map_err(|rejection| rejection_error(rejection, EntityKind::Agent, &agent.name, target))
    }
}

fn rejection_error(rejection: Rejection, kind: EntityKind, key: &str, attempted: StatusKind) -> StatusError {
    match rejection {
        Rejection::AlreadyTerminal { recorded } => StatusError::AlreadyTerminal {
            kind,
            key: key.to_string(),
            recorded,
            attempted,
        },
        Rejection::Invalid { from } => StatusError::InvalidTransition {
            kind,
            key: key.to_string(),
            from,
            to: attempted,
        },
    }
}

fn outcome_status(outcome: RunOutcome) -> StatusKind {
    match outcome {
        RunOutcome::Unset => StatusKind::Active,
        RunOutcome::Succeeded => StatusKind::Completed,
        RunOutcome::Failed => StatusKind::Failed,
    }
}

fn error_text(error: &str) -> String {
    let error = truncate_message(error);
    if error.is_empty() {
        MISSING_ERROR_MESSAGE.to_string()
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn two_stage_run() -> RunModel {
        let topology = vec![
            StageConfig::new("intent", "INTENT", &["a", "b"]),
            StageConfig::new("plan", "PLAN", &["c"]),
        ];
        RunModel::new("add async auth", "pip_test", t(0), &topology).unwrap()
    }

    #[test]
    fn test_lifecycle_start_is_idempotent() {
        let mut lc = Lifecycle::Pending;
        assert_eq!(lc.activate(t(1)), Ok(Applied::Changed));
        assert_eq!(lc.activate(t(5)), Ok(Applied::Repeated));
        assert_eq!(lc.start_time(), Some(t(1)));
    }

    #[test]
    fn test_lifecycle_complete_records_duration() {
        let mut lc = Lifecycle::Active { start: t(10) };
        lc.complete(t(25), None).unwrap();
        assert_eq!(lc.end_time(), Some(t(25)));
        assert_eq!(lc.duration_ms(), Some(15_000));
    }

    #[test]
    fn test_lifecycle_complete_from_pending_backfills_start() {
        let mut lc = Lifecycle::Pending;
        lc.complete(t(30), None).unwrap();
        assert_eq!(lc.start_time(), Some(t(30)));
        assert_eq!(lc.duration_ms(), Some(0));
    }

    #[test]
    fn test_lifecycle_reported_duration_backfills_start() {
        let mut lc = Lifecycle::Pending;
        lc.complete(t(30), Some(4_000)).unwrap();
        assert_eq!(lc.start_time(), Some(t(26)));
        assert_eq!(lc.duration_ms(), Some(4_000));
    }

    #[test]
    fn test_lifecycle_measured_duration_wins_over_reported() {
        let mut lc = Lifecycle::Active { start: t(0) };
        lc.complete(t(8), Some(1_000)).unwrap();
        assert_eq!(lc.duration_ms(), Some(8_000));
    }

    #[test]
    fn test_lifecycle_clock_skew_never_inverts_span() {
        let mut lc = Lifecycle::Active { start: t(10) };
        lc.fail(t(5), "boom".into()).unwrap();
        assert_eq!(lc.end_time(), Some(t(10)));
        assert_eq!(lc.duration_ms(), Some(0));
    }

    #[test]
    fn test_lifecycle_waiting_keeps_start() {
        let mut lc = Lifecycle::Active { start: t(3) };
        lc.wait().unwrap();
        assert_eq!(lc.kind(), StatusKind::Waiting);
        lc.activate(t(9)).unwrap();
        assert_eq!(lc.start_time(), Some(t(3)));
    }

    #[test]
    fn test_lifecycle_waiting_cannot_complete() {
        let mut lc = Lifecycle::Waiting { start: None };
        assert_eq!(
            lc.complete(t(1), None),
            Err(Rejection::Invalid { from: StatusKind::Waiting })
        );
        assert!(lc.fail(t(1), "declined".into()).is_ok());
    }

    #[test]
    fn test_lifecycle_conflicting_terminal_rejected() {
        let mut lc = Lifecycle::Pending;
        lc.complete(t(1), None).unwrap();
        let before = lc.clone();
        assert_eq!(
            lc.fail(t(2), "late".into()),
            Err(Rejection::AlreadyTerminal { recorded: StatusKind::Completed })
        );
        assert_eq!(lc, before);
    }

    #[test]
    fn test_lifecycle_terminal_cannot_restart() {
        let mut lc = Lifecycle::Pending;
        lc.fail(t(1), "x".into()).unwrap();
        assert_eq!(lc.activate(t(2)), Err(Rejection::Invalid { from: StatusKind::Failed }));
        assert_eq!(lc.wait(), Err(Rejection::Invalid { from: StatusKind::Failed }));
    }

    #[test]
    fn test_repeated_failure_refreshes_error_only() {
        let mut lc = Lifecycle::Active { start: t(0) };
        lc.fail(t(4), "first".into()).unwrap();
        assert_eq!(lc.fail(t(9), "second".into()), Ok(Applied::Repeated));
        assert_eq!(lc.end_time(), Some(t(4)));
        assert_eq!(lc.error(), Some("second"));
    }

    #[test]
    fn test_model_rejects_duplicate_agent_names() {
        let topology = vec![
            StageConfig::new("intent", "INTENT", &["a"]),
            StageConfig::new("plan", "PLAN", &["a"]),
        ];
        let err = RunModel::new("req", "id", t(0), &topology).unwrap_err();
        assert!(matches!(err, StatusError::Config(_)));
    }

    #[test]
    fn test_model_unknown_agent_is_not_found() {
        let mut run = two_stage_run();
        let err = run.agent_started("ghost", "", t(1)).unwrap_err();
        assert!(matches!(err, StatusError::NotFound { kind: EntityKind::Agent, .. }));
        assert_eq!(run.completed_agents(), 0);
        assert!(run.to_view().current_stage.is_none());
    }

    #[test]
    fn test_model_agent_lifecycle_and_messages() {
        let mut run = two_stage_run();
        run.agent_started("a", "reading files", t(1)).unwrap();
        run.agent_completed("a", None, "found 5 files\nand more", t(4)).unwrap();
        run.agent_failed("c", "boom", t(6)).unwrap();

        let view = run.to_view();
        let a = &view.stages[0].agents[0];
        assert_eq!(a.status, StatusKind::Completed);
        assert_eq!(a.duration_ms, Some(3_000));
        assert_eq!(a.message, COMPLETED_MESSAGE);
        assert_eq!(a.preview, "found 5 files and more");

        let c = &view.stages[1].agents[0];
        assert_eq!(c.status, StatusKind::Failed);
        assert_eq!(c.message, "boom");
        assert_eq!(run.completed_agents(), 1);
    }

    #[test]
    fn test_model_repeat_completion_keeps_end_time() {
        let mut run = two_stage_run();
        run.agent_started("a", "", t(1)).unwrap();
        assert_eq!(run.agent_completed("a", None, "v1", t(2)).unwrap(), Applied::Changed);
        assert_eq!(run.agent_completed("a", None, "v2", t(9)).unwrap(), Applied::Repeated);
        let view = run.to_view();
        assert_eq!(view.stages[0].agents[0].ended_at, Some(t(2)));
        assert_eq!(view.stages[0].agents[0].preview, "v2");
    }

    #[test]
    fn test_model_stage_status_is_independent_of_agents() {
        let mut run = two_stage_run();
        run.complete_stage("plan", t(1)).unwrap();
        let view = run.to_view();
        assert_eq!(view.stages[1].status, StatusKind::Completed);
        assert_eq!(view.stages[1].agents[0].status, StatusKind::Pending);
    }

    #[test]
    fn test_model_begin_stage_moves_focus() {
        let mut run = two_stage_run();
        run.begin_stage("plan", t(1)).unwrap();
        assert_eq!(run.to_view().current_stage.as_deref(), Some("plan"));
        run.agent_started("a", "", t(2)).unwrap();
        assert_eq!(run.to_view().current_stage.as_deref(), Some("intent"));
    }

    #[test]
    fn test_model_fail_stage_without_reason() {
        let mut run = two_stage_run();
        run.fail_stage("intent", "  ", t(1)).unwrap();
        assert_eq!(run.to_view().stages[0].error.as_deref(), Some(MISSING_ERROR_MESSAGE));
    }

    #[test]
    fn test_model_finish_is_idempotent() {
        let mut run = two_stage_run();
        assert_eq!(run.finish(true, Some("done"), t(10)).unwrap(), Applied::Changed);
        assert_eq!(run.finish(true, Some("done again"), t(20)).unwrap(), Applied::Repeated);
        let view = run.to_view();
        assert_eq!(view.ended_at, Some(t(10)));
        assert_eq!(view.summary.as_deref(), Some("done again"));

        let err = run.finish(false, None, t(30)).unwrap_err();
        assert!(matches!(err, StatusError::AlreadyTerminal { kind: EntityKind::Run, .. }));
        assert_eq!(run.outcome(), RunOutcome::Succeeded);
    }
}
