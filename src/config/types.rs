use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::display::monitor::MIN_REFRESH;
use crate::display::{GlyphSet, MonitorConfig, RenderOptions};
use crate::pipeline::{default_stages, StageConfig};

pub const DEFAULT_REFRESH_MS: u64 = 2000;
pub const MIN_REFRESH_MS: u64 = MIN_REFRESH.as_millis() as u64;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TrackerConfig {
    pub stages: Option<Vec<StageConfig>>,
    pub display: Option<DisplayConfig>,
    pub snapshot: Option<SnapshotConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DisplayConfig {
    pub refresh_ms: Option<u64>,
    pub glyphs: Option<GlyphSet>,
    /// Unset means follow the terminal.
    pub color: Option<bool>,
    pub request_width: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    pub path: PathBuf,
}

impl TrackerConfig {
    /// The configured topology, or the built-in one.
    pub fn topology(&self) -> Vec<StageConfig> {
        self.stages.clone().unwrap_or_else(default_stages)
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot.as_ref().map(|s| s.path.clone())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        let display = self.display.clone().unwrap_or_default();
        let defaults = RenderOptions::default();
        let refresh_ms = display.refresh_ms.unwrap_or(DEFAULT_REFRESH_MS).max(MIN_REFRESH_MS);
        MonitorConfig {
            refresh: Duration::from_millis(refresh_ms),
            render: RenderOptions {
                glyphs: display.glyphs.unwrap_or(defaults.glyphs),
                color: display.color.unwrap_or_else(console::colors_enabled),
                request_width: display.request_width.unwrap_or(defaults.request_width),
                bar_width: defaults.bar_width,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.topology().len(), default_stages().len());
        assert!(config.snapshot_path().is_none());
        let monitor = config.monitor_config();
        assert_eq!(monitor.refresh, Duration::from_millis(DEFAULT_REFRESH_MS));
        assert_eq!(monitor.render.glyphs, GlyphSet::Unicode);
        assert_eq!(monitor.render.request_width, 50);
    }

    #[test]
    fn test_display_overrides() {
        let config = TrackerConfig {
            display: Some(DisplayConfig {
                refresh_ms: Some(10),
                glyphs: Some(GlyphSet::Ascii),
                color: Some(false),
                request_width: Some(30),
            }),
            ..Default::default()
        };
        let monitor = config.monitor_config();
        assert_eq!(monitor.refresh, Duration::from_millis(MIN_REFRESH_MS));
        assert_eq!(monitor.render.glyphs, GlyphSet::Ascii);
        assert!(!monitor.render.color);
        assert_eq!(monitor.render.request_width, 30);
    }
}
