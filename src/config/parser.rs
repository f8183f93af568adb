use std::path::Path;
use crate::errors::StatusError;
use crate::pipeline::validate_topology;
use super::types::TrackerConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<TrackerConfig, StatusError> {
    if !path.exists() {
        return Err(StatusError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(StatusError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = parse_config_str(&content)?;
    debug!(
        path = %path.display(),
        stages = config.stages.as_ref().map_or(0, Vec::len),
        "Loaded config"
    );
    Ok(config)
}

/// Parse a config document already in memory.
pub fn parse_config_str(content: &str) -> Result<TrackerConfig, StatusError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(TrackerConfig::default());
    }

    validate_schema(&yaml)?;

    let config: TrackerConfig = serde_yaml::from_value(yaml)?;

    validate_semantics(&config)?;

    Ok(config)
}

/// Check the document against the JSON schema. Advisory: mismatches are
/// logged, and the typed parse that follows decides what is fatal.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), StatusError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| StatusError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| StatusError::Config(format!("Schema compilation error: {}", e)))?;

    if let Err(errors) = compiled.validate(&json_value) {
        for error in errors {
            warn!(validation_error = %format!("{} at {}", error, error.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

fn validate_semantics(config: &TrackerConfig) -> Result<(), StatusError> {
    if let Some(stages) = &config.stages {
        validate_topology(stages)?;
    }

    if let Some(display) = &config.display {
        if display.request_width == Some(0) {
            return Err(StatusError::Config("display.request_width must be at least 1".into()));
        }
    }

    if let Some(snapshot) = &config.snapshot {
        if snapshot.path.as_os_str().is_empty() {
            return Err(StatusError::Config("snapshot.path must not be empty".into()));
        }
    }

    Ok(())
}
