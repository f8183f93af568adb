use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use crate::errors::StatusError;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("static name pattern")
});

/// Declaration of one stage and the agents it runs, fixed for the lifetime
/// of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    pub key: String,
    pub display_name: String,
    pub agents: Vec<String>,
    /// Hidden from the stage overview until it is touched, and left out of
    /// the "Stage n/total" count.
    #[serde(default)]
    pub optional: bool,
}

impl StageConfig {
    pub fn new(key: &str, display_name: &str, agents: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

struct StageDefinition {
    key: &'static str,
    display_name: &'static str,
    agents: &'static [&'static str],
    optional: bool,
}

static DEFAULT_STAGES: &[StageDefinition] = &[
    StageDefinition {
        key: "routing",
        display_name: "ROUTING",
        agents: &["router"],
        optional: false,
    },
    StageDefinition {
        key: "intent",
        display_name: "INTENT ANALYSIS",
        agents: &["intent-cc", "intent-gpt5", "intent-merge-cc"],
        optional: false,
    },
    StageDefinition {
        key: "planning",
        display_name: "PLANNING",
        agents: &["plan-cc", "plan-gpt5", "plan-merge-cc"],
        optional: false,
    },
    StageDefinition {
        key: "development",
        display_name: "DEVELOPMENT",
        agents: &["dev-cc"],
        optional: false,
    },
    StageDefinition {
        key: "evaluation",
        display_name: "EVALUATION",
        agents: &["eval-gpt5"],
        optional: false,
    },
    StageDefinition {
        key: "rollback",
        display_name: "ROLLBACK",
        agents: &["rollback-cc"],
        optional: true,
    },
];

/// The standard development pipeline: routing, intent analysis, planning,
/// development, evaluation, and an optional rollback stage.
pub fn default_stages() -> Vec<StageConfig> {
    DEFAULT_STAGES
        .iter()
        .map(|def| StageConfig {
            key: def.key.to_string(),
            display_name: def.display_name.to_string(),
            agents: def.agents.iter().map(|a| a.to_string()).collect(),
            optional: def.optional,
        })
        .collect()
}

/// Check a stage declaration before a run is built from it.
///
/// Agents are looked up by name alone, so agent names must be unique across
/// the whole run, not just within their stage.
pub fn validate_topology(stages: &[StageConfig]) -> Result<(), StatusError> {
    if stages.is_empty() {
        return Err(StatusError::Config("pipeline declares no stages".into()));
    }

    let mut stage_keys = HashSet::new();
    let mut agent_names = HashSet::new();
    for stage in stages {
        if !NAME_PATTERN.is_match(&stage.key) {
            return Err(StatusError::Config(format!("invalid stage key '{}'", stage.key)));
        }
        if stage.display_name.trim().is_empty() {
            return Err(StatusError::Config(format!(
                "stage '{}' has an empty display name",
                stage.key
            )));
        }
        if !stage_keys.insert(stage.key.as_str()) {
            return Err(StatusError::Config(format!("duplicate stage key '{}'", stage.key)));
        }
        for agent in &stage.agents {
            if !NAME_PATTERN.is_match(agent) {
                return Err(StatusError::Config(format!(
                    "invalid agent name '{}' in stage '{}'",
                    agent, stage.key
                )));
            }
            if !agent_names.insert(agent.as_str()) {
                return Err(StatusError::Config(format!(
                    "agent '{}' is declared more than once",
                    agent
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology_is_valid() {
        assert!(validate_topology(&default_stages()).is_ok());
    }

    #[test]
    fn test_empty_topology_rejected() {
        assert!(validate_topology(&[]).is_err());
    }

    #[test]
    fn test_duplicate_stage_key_rejected() {
        let stages = vec![
            StageConfig::new("plan", "PLAN", &["a"]),
            StageConfig::new("plan", "PLAN AGAIN", &["b"]),
        ];
        let err = validate_topology(&stages).unwrap_err();
        assert!(err.to_string().contains("duplicate stage key 'plan'"));
    }

    #[test]
    fn test_agent_name_unique_across_stages() {
        let stages = vec![
            StageConfig::new("intent", "INTENT", &["merge"]),
            StageConfig::new("plan", "PLAN", &["merge"]),
        ];
        let err = validate_topology(&stages).unwrap_err();
        assert!(err.to_string().contains("'merge' is declared more than once"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(validate_topology(&[StageConfig::new("", "X", &["a"])]).is_err());
        assert!(validate_topology(&[StageConfig::new("x", "X", &["has space"])]).is_err());
        assert!(validate_topology(&[StageConfig::new("x", " ", &["a"])]).is_err());
    }

    #[test]
    fn test_stage_without_agents_allowed() {
        assert!(validate_topology(&[StageConfig::new("gate", "GATE", &[])]).is_ok());
    }

    #[test]
    fn test_default_topology() {
        let stages = default_stages();
        assert_eq!(stages.len(), 6);
        assert_eq!(stages[0].key, "routing");
        assert_eq!(stages[1].agents, vec!["intent-cc", "intent-gpt5", "intent-merge-cc"]);
        assert!(stages[5].optional);
        assert_eq!(stages.iter().filter(|s| s.optional).count(), 1);
    }

    #[test]
    fn test_optional_flag_defaults_to_false_in_yaml() {
        let yaml = "key: plan\ndisplay_name: PLAN\nagents: [c]\n";
        let stage: StageConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!stage.optional);
        assert_eq!(stage, StageConfig::new("plan", "PLAN", &["c"]));
    }
}
