use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::state::{RunOutcome, StatusKind};

/// Point-in-time copy of the tracked run, detached from the live model.
///
/// Serializes to the JSON mirror that out-of-process viewers poll, so every
/// field tolerates being absent on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunSnapshot {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub run: Option<RunView>,
}

impl RunSnapshot {
    /// The snapshot of a store that has not started a run yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.run.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.run
            .as_ref()
            .map_or(false, |run| run.outcome != RunOutcome::Unset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunView {
    pub request: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outcome: RunOutcome,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub stages: Vec<StageView>,
}

impl RunView {
    pub fn total_agents(&self) -> usize {
        self.stages.iter().map(|s| s.agents.len()).sum()
    }

    pub fn completed_agents(&self) -> usize {
        self.stages.iter().map(StageView::completed_agents).sum()
    }

    pub fn stage(&self, key: &str) -> Option<&StageView> {
        self.stages.iter().find(|s| s.key == key)
    }

    pub fn agent(&self, name: &str) -> Option<&AgentView> {
        self.stages
            .iter()
            .flat_map(|s| s.agents.iter())
            .find(|a| a.name == name)
    }

    /// The stage the view focuses on, with its position among all stages.
    pub fn focused_stage(&self) -> Option<(usize, &StageView)> {
        let key = self.current_stage.as_deref()?;
        self.stages.iter().enumerate().find(|(_, s)| s.key == key)
    }

    /// The agent currently doing work, preferring the focused stage.
    pub fn active_agent(&self) -> Option<&AgentView> {
        let focused = self
            .focused_stage()
            .and_then(|(_, stage)| stage.agents.iter().find(|a| a.status == StatusKind::Active));
        focused.or_else(|| {
            self.stages
                .iter()
                .flat_map(|s| s.agents.iter())
                .find(|a| a.status == StatusKind::Active)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageView {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub optional: bool,
    pub status: StatusKind,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub agents: Vec<AgentView>,
}

impl StageView {
    pub fn completed_agents(&self) -> usize {
        self.agents
            .iter()
            .filter(|a| a.status == StatusKind::Completed)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub name: String,
    pub status: StatusKind,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub preview: String,
}
