pub mod renderer;
pub mod monitor;

pub use renderer::{render, render_snapshot, render_version, GlyphSet, RenderOptions};
pub use monitor::{
    BufferSink, FrameSink, Monitor, MonitorConfig, MonitorExit, SnapshotFile, SnapshotSource,
    TermSink,
};
