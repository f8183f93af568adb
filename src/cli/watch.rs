use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::cli::commands::WatchArgs;
use crate::cli::{cancel_on_interrupt, load_config, monitor_config};
use crate::clock::{Clock, SystemClock};
use crate::display::{render_snapshot, Monitor, MonitorExit, SnapshotFile, SnapshotSource, TermSink};
use crate::errors::StatusError;

pub async fn handle_watch(args: WatchArgs, no_color: bool) -> Result<(), StatusError> {
    let config = load_config(args.config.as_deref()).await?;
    let path = args
        .snapshot
        .clone()
        .or_else(|| config.snapshot_path())
        .ok_or_else(|| {
            StatusError::Config("No snapshot file given: pass --snapshot or set snapshot.path".into())
        })?;
    let settings = monitor_config(&config, &args.display, no_color);
    let source = SnapshotFile::new(&path);

    if args.once {
        let snapshot = source.fetch().await?;
        println!("{}", render_snapshot(&snapshot, SystemClock.now(), &settings.render));
        return Ok(());
    }

    info!(
        path = %path.display(),
        refresh_ms = settings.refresh.as_millis() as u64,
        "Watching snapshot file"
    );
    let token = CancellationToken::new();
    let interrupt = cancel_on_interrupt(token.clone());
    let sink = if args.no_clear {
        TermSink::stdout().without_clearing()
    } else {
        TermSink::stdout()
    };
    let mut monitor = Monitor::new(source, sink, settings);
    let exit = monitor.run(token).await;
    interrupt.abort();

    match exit {
        MonitorExit::RunFinished => info!("Run finished"),
        MonitorExit::Cancelled => info!("Watch stopped"),
    }
    Ok(())
}
