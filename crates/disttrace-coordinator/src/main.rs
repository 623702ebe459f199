//! disttrace-coordinator — receives agent traceroute submissions, serves
//! agent configuration, and exposes the operator HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use disttrace_coordinator::state::CoordinatorState;
use disttrace_store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "disttrace-coordinator", about = "dist-traceroute coordinator")]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, default_value = "disttrace.db")]
    db: String,

    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "0.0.0.0:8990")]
    bind: SocketAddr,

    /// Log file path; defaults to stdout.
    #[arg(long)]
    log: Option<std::path::PathBuf>,

    /// Combined-log-format access log path, written independently of the
    /// application log stream.
    #[arg(long, default_value = "access.log")]
    accesslog: std::path::PathBuf,

    #[arg(long = "loglevel", value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app_filter = EnvFilter::new(format!(
        "access_log=off,disttrace_coordinator={0},disttrace_registry={0},disttrace_store={0},disttrace_auth={0},tower_http={0}",
        cli.loglevel.as_directive(),
    ));
    let app_layer = match &cli.log {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            fmt::layer().with_writer(file).with_ansi(false).boxed()
        }
        None => fmt::layer().boxed(),
    }
    .with_filter(app_filter);

    let access_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.accesslog)?;
    let access_layer = fmt::layer()
        .with_writer(access_file)
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|meta| meta.target() == "access_log"));

    tracing_subscriber::registry()
        .with(app_layer)
        .with(access_layer)
        .init();

    let store = match Store::open(&cli.db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, db = %cli.db, "couldn't open database");
            std::process::exit(1);
        }
    };

    let state = CoordinatorState::new(store);
    let app = disttrace_coordinator::router(state);

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!(addr = %cli.bind, db = %cli.db, "coordinator listening");

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone());

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            info!("shutdown signal received, draining in-flight requests (up to 5s)");
        }
    });

    // Bound the graceful-shutdown window (spec §4.J): once the drain starts,
    // force the process down after 5s regardless of stuck connections.
    tokio::select! {
        result = serve => result?,
        _ = async { cancel.cancelled().await; tokio::time::sleep(Duration::from_secs(5)).await } => {
            info!("graceful shutdown deadline elapsed, exiting");
        }
    }

    info!("disttrace-coordinator shut down cleanly");
    Ok(())
}

fn install_signal_handlers(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async { tokio::signal::ctrl_c().await.expect("ctrl_c handler installs") };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("SIGTERM handler installs")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = terminate => info!("received SIGTERM"),
        }
        cancel.cancel();
    });
}
