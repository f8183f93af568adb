use chrono::{DateTime, Utc};
use super::snapshot::RunView;

/// Below this completion fraction the remaining-time extrapolation is too
/// noisy to show.
pub const MIN_CONFIDENT_FRACTION: f64 = 0.05;

/// Completion and timing figures derived from one snapshot.
///
/// Remaining time is a naive linear extrapolation: it assumes every agent
/// takes the average time of the agents finished so far. It is not weighted
/// by agent and knows nothing about the critical path, so it under-estimates
/// early in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEstimate {
    pub as_of: DateTime<Utc>,
    pub completed_agents: usize,
    pub total_agents: usize,
    pub fraction: f64,
    pub elapsed_ms: u64,
    pub estimated_total_ms: Option<u64>,
    pub estimated_remaining_ms: Option<u64>,
}

impl ProgressEstimate {
    /// Figures for a store with no run.
    pub fn idle(now: DateTime<Utc>) -> Self {
        Self {
            as_of: now,
            completed_agents: 0,
            total_agents: 0,
            fraction: 0.0,
            elapsed_ms: 0,
            estimated_total_ms: None,
            estimated_remaining_ms: None,
        }
    }

    /// Remaining time, or `None` while too little of the run has finished
    /// for the extrapolation to mean anything.
    pub fn confident_remaining_ms(&self) -> Option<u64> {
        if self.fraction < MIN_CONFIDENT_FRACTION {
            return None;
        }
        self.estimated_remaining_ms
    }
}

/// Estimate progress of `run` as of `now`.
///
/// Only agents count toward completion; failed agents are not completed.
/// Elapsed time stops at the run's end timestamp once it has one.
pub fn estimate(run: &RunView, now: DateTime<Utc>) -> ProgressEstimate {
    let total_agents = run.total_agents();
    let completed_agents = run.completed_agents();
    let fraction = if total_agents == 0 {
        0.0
    } else {
        completed_agents as f64 / total_agents as f64
    };

    let until = run.ended_at.unwrap_or(now);
    let elapsed_ms = u64::try_from((until - run.started_at).num_milliseconds()).unwrap_or(0);

    let estimated_total_ms = if fraction > 0.0 {
        Some((elapsed_ms as f64 / fraction).round() as u64)
    } else {
        None
    };
    let estimated_remaining_ms = estimated_total_ms.map(|total| total.saturating_sub(elapsed_ms));

    ProgressEstimate {
        as_of: now,
        completed_agents,
        total_agents,
        fraction,
        elapsed_ms,
        estimated_total_ms,
        estimated_remaining_ms,
    }
}
