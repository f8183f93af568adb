use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::cli::commands::DemoArgs;
use crate::cli::{cancel_on_interrupt, load_config, monitor_config};
use crate::clock::SystemClock;
use crate::display::{render_snapshot, Monitor, TermSink};
use crate::errors::{EntityKind, StatusError};
use crate::pipeline::StageConfig;
use crate::store::StatusStore;

const SIMULATED_FAILURE: &str = "simulated failure";

/// How a simulated run behaves.
#[derive(Debug, Clone)]
pub struct DemoScript {
    pub step: Duration,
    pub fail_agent: Option<String>,
}

pub async fn handle_demo(args: DemoArgs, no_color: bool, quiet: bool) -> Result<(), StatusError> {
    let config = load_config(args.config.as_deref()).await?;
    let topology = config.topology();
    if let Some(agent) = &args.fail_agent {
        check_fail_agent(&topology, agent)?;
    }

    let settings = monitor_config(&config, &args.display, no_color);
    let mirror = args.mirror.clone().or_else(|| config.snapshot_path());
    let store = StatusStore::with_options(Arc::new(SystemClock), mirror);
    let handle = store.start_run(&args.request, &topology).await?;
    info!(run_id = %handle.run_id, "Demo run started");

    let token = CancellationToken::new();
    let interrupt = cancel_on_interrupt(token.clone());
    let monitor = if quiet {
        None
    } else {
        let mut monitor = Monitor::new(store.clone(), TermSink::stdout(), settings.clone());
        let token = token.clone();
        Some(tokio::spawn(async move { monitor.run(token).await }))
    };

    let script = DemoScript {
        step: Duration::from_millis(args.step_ms),
        fail_agent: args.fail_agent.clone(),
    };
    let simulated = tokio::select! {
        result = simulate(&store, &topology, &script) => result.map(Some),
        _ = token.cancelled() => Ok(None),
    };
    let outcome = match simulated {
        Ok(outcome) => outcome,
        Err(e) => {
            token.cancel();
            interrupt.abort();
            return Err(e);
        }
    };

    let (success, summary) = match (outcome, &script.fail_agent) {
        (Some(true), _) => (true, "All stages completed".to_string()),
        (Some(false), Some(agent)) => (false, format!("Agent {} failed, rollback applied", agent)),
        (Some(false), None) => (false, "Pipeline failed".to_string()),
        (None, _) => (false, "Interrupted".to_string()),
    };
    store.finish_run(success, Some(&summary)).await?;

    if let Some(task) = monitor {
        match task.await {
            Ok(exit) => debug!(?exit, "Monitor stopped"),
            Err(e) => warn!(error = %e, "Monitor task failed"),
        }
    }
    interrupt.abort();

    if quiet {
        let snapshot = store.snapshot().await;
        println!("{}", render_snapshot(&snapshot, store.clock().now(), &settings.render));
    }
    Ok(())
}

/// The failing agent must exist and sit in a mandatory stage. Optional
/// stages only run after a failure, so failing one of their agents would
/// never happen.
pub fn check_fail_agent(topology: &[StageConfig], agent: &str) -> Result<(), StatusError> {
    let stage = topology
        .iter()
        .find(|stage| stage.agents.iter().any(|a| a == agent))
        .ok_or_else(|| StatusError::not_found(EntityKind::Agent, agent))?;
    if stage.optional {
        return Err(StatusError::Config(format!(
            "agent '{}' belongs to optional stage '{}', which only runs after a failure",
            agent, stage.key
        )));
    }
    Ok(())
}

/// Drive `store` through one simulated run of `topology`. Agents within a
/// stage run concurrently. Optional stages only run once something failed,
/// and a failure skips the remaining mandatory stages.
///
/// Returns whether every stage that ran succeeded. The run itself is left
/// unfinished.
pub async fn simulate(
    store: &StatusStore,
    topology: &[StageConfig],
    script: &DemoScript,
) -> Result<bool, StatusError> {
    let mut failed = false;
    for stage in topology {
        let runs_now = if failed { stage.optional } else { !stage.optional };
        if !runs_now {
            debug!(stage = %stage.key, "Skipping stage");
            continue;
        }

        store.begin_stage(&stage.key).await?;
        let outcomes = join_all(
            stage
                .agents
                .iter()
                .map(|agent| run_agent(store, stage, agent, script)),
        )
        .await;
        let all_succeeded = outcomes
            .into_iter()
            .collect::<Result<Vec<bool>, StatusError>>()?
            .into_iter()
            .all(|ok| ok);

        if all_succeeded {
            store.complete_stage(&stage.key).await?;
        } else {
            store.fail_stage(&stage.key, "one or more agents failed").await?;
            failed = true;
        }
    }
    Ok(!failed)
}

async fn run_agent(
    store: &StatusStore,
    stage: &StageConfig,
    agent: &str,
    script: &DemoScript,
) -> Result<bool, StatusError> {
    // Merge agents wait on their siblings before doing any work.
    if agent.contains("merge") {
        store.agent_waiting(agent, "Waiting for upstream results").await?;
        tokio::time::sleep(script.step).await;
    }

    let task = stage.display_name.to_lowercase();
    store.agent_started(agent, &format!("Working on {}", task)).await?;
    tokio::time::sleep(script.step).await;

    if script.fail_agent.as_deref() == Some(agent) {
        store.agent_failed(agent, SIMULATED_FAILURE).await?;
        return Ok(false);
    }
    store
        .agent_completed(agent, None, &format!("{} finished {}", agent, task))
        .await?;
    Ok(true)
}
