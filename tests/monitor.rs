use stagewatch::display::{
    BufferSink, GlyphSet, Monitor, MonitorConfig, MonitorExit, RenderOptions, SnapshotFile,
};
use stagewatch::pipeline::StageConfig;
use stagewatch::StatusStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        refresh: Duration::from_millis(20),
        render: RenderOptions { glyphs: GlyphSet::Ascii, ..Default::default() },
    }
}

#[tokio::test]
async fn test_file_monitor_follows_mirrored_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status.json");
    let store = StatusStore::with_options(Arc::new(stagewatch::SystemClock), Some(path.clone()));
    let stages = vec![StageConfig::new("build", "BUILD", &["compiler", "linker"])];

    let mut monitor = Monitor::new(SnapshotFile::new(&path), BufferSink::new(), fast_config());
    let token = CancellationToken::new();
    let watcher = tokio::spawn(async move {
        let exit = monitor.run(token).await;
        (exit, monitor.into_sink())
    });

    store.start_run("link the binary", &stages).await.unwrap();
    store.begin_stage("build").await.unwrap();
    store.agent_started("compiler", "compiling crates").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    store.agent_completed("compiler", None, "42 crates").await.unwrap();
    store.agent_started("linker", "linking").await.unwrap();
    store.agent_completed("linker", None, "done").await.unwrap();
    store.complete_stage("build").await.unwrap();
    store.finish_run(true, Some("binary ready")).await.unwrap();

    let (exit, sink) = tokio::time::timeout(Duration::from_secs(10), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, MonitorExit::RunFinished);

    let last = sink.last().unwrap();
    assert!(last.contains("PIPELINE COMPLETED"));
    assert!(last.contains("Summary: binary ready"));
    assert!(last.contains("Agents: 2/2"));
    assert!(sink.frames().iter().any(|f| f.contains("Current: compiler - compiling crates")));
}

#[tokio::test]
async fn test_store_monitor_stops_on_cancel() {
    let store = StatusStore::new();
    let stages = vec![StageConfig::new("build", "BUILD", &["compiler"])];
    store.start_run("never ends", &stages).await.unwrap();

    let mut monitor = Monitor::new(store.clone(), BufferSink::new(), fast_config());
    let token = CancellationToken::new();
    let stopper = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let exit = tokio::time::timeout(Duration::from_secs(10), monitor.run(token))
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(exit, MonitorExit::Cancelled);
    assert!(monitor.sink().frames().len() >= 2);
    assert!(monitor.sink().last().unwrap().contains("Est. Remaining: Calculating..."));
}
