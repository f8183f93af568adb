use console::style;
use tracing::info;
use crate::cli::commands::ValidateArgs;
use crate::config::parse_config;
use crate::errors::StatusError;

pub async fn handle_validate(args: ValidateArgs) -> Result<(), StatusError> {
    let config = parse_config(&args.config).await?;
    let topology = config.topology();
    let agents: usize = topology.iter().map(|s| s.agents.len()).sum();
    info!(path = %args.config.display(), stages = topology.len(), agents, "Config validated");

    println!("{} Configuration is valid: {}", style("✓").green(), args.config.display());
    if config.stages.is_none() {
        println!("  No stages declared, the built-in pipeline will be used");
    }
    for stage in &topology {
        let marker = if stage.optional { " (optional)" } else { "" };
        println!(
            "  {} {}{}: {}",
            style(&stage.key).cyan(),
            stage.display_name,
            marker,
            stage.agents.join(", ")
        );
    }
    Ok(())
}
