pub mod commands;
pub mod demo;
pub mod validate;
pub mod watch;

pub use commands::{Cli, Commands};

use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::config::{parse_config, TrackerConfig, MIN_REFRESH_MS};
use crate::display::{GlyphSet, MonitorConfig};
use crate::errors::StatusError;
use commands::DisplayArgs;

/// Load the config file if one was given, else the built-in defaults.
pub async fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StatusError> {
    match path {
        Some(path) => parse_config(path).await,
        None => Ok(TrackerConfig::default()),
    }
}

/// Config-file display settings with command-line flags layered on top.
pub fn monitor_config(config: &TrackerConfig, display: &DisplayArgs, no_color: bool) -> MonitorConfig {
    let mut resolved = config.monitor_config();
    if let Some(refresh_ms) = display.refresh {
        resolved.refresh = Duration::from_millis(refresh_ms.max(MIN_REFRESH_MS));
    }
    if display.ascii {
        resolved.render.glyphs = GlyphSet::Ascii;
    }
    if no_color {
        resolved.render.color = false;
    }
    resolved
}

/// Cancel `token` on Ctrl-C. Abort the returned task once it is no longer
/// needed.
pub fn cancel_on_interrupt(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            token.cancel();
        }
    })
}
