use clap::Parser;
use stagewatch::cli;
use stagewatch::display::render_version;
use stagewatch::errors::StatusError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr so they never interleave with rendered frames.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.with_ansi(!cli.no_color).init();
    }

    let result = match cli.command {
        cli::Commands::Watch(args) => cli::watch::handle_watch(args, cli.no_color).await,
        cli::Commands::Demo(args) => cli::demo::handle_demo(args, cli.no_color, cli.quiet).await,
        cli::Commands::Validate(args) => cli::validate::handle_validate(args).await,
        cli::Commands::Version => {
            println!("{}", render_version());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            StatusError::Config(_) | StatusError::Yaml(_) => 2,
            StatusError::Io(_) | StatusError::Json(_) => 3,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
