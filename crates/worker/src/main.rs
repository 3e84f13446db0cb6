use std::io::Read;
use std::path::Path;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use authtrail_worker::{bootstrap, telemetry};
use authtrail_worker::config::{WorkerConfig, pool_id_from_env};

/// Logs recent Cognito sign-in history for the subjects named in queued events.
#[derive(Parser, Debug)]
#[command(name = "authtrail-worker", about = "Cognito auth history resolver for SQS batches")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "authtrail.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Consume batches from the configured queue until interrupted (default).
    Run,
    /// Process a single Lambda-style SQS event document and print the response.
    Replay {
        /// File holding the event document, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Verify that the configured user pool is reachable, then exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = bootstrap::load_config(Path::new(&cli.config))?;

    let pool_override = pool_id_from_env();
    let guard = telemetry::init(
        &config.telemetry,
        telemetry::worker_resource(&config, pool_override.clone()),
    );

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, pool_override).await,
        Commands::Replay { event } => replay(&config, pool_override, &event).await,
        Commands::Check => check(&config, pool_override).await,
    };
    if let Err(e) = &result {
        error!(error = %e, "authtrail worker failed");
    }

    guard.shutdown();
    result
}

async fn run(
    config: &WorkerConfig,
    pool_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let consumer = bootstrap::sqs_consumer(config, pool_override).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    consumer.run(shutdown_rx).await;
    info!("authtrail worker shut down");
    Ok(())
}

async fn replay(
    config: &WorkerConfig,
    pool_override: Option<String>,
    event: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = if event == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(event)?
    };

    let resolver = bootstrap::cognito_resolver(config, pool_override).await?;
    let response = bootstrap::replay(&resolver, &document).await?;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn check(
    config: &WorkerConfig,
    pool_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = bootstrap::cognito_resolver(config, pool_override).await?;
    bootstrap::check(&resolver).await?;
    println!("ok");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
