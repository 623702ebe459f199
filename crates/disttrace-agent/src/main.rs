//! disttrace-agent — periodically traceroutes its assigned targets and
//! submits results to the coordinator.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use disttrace_agent::{channel, ConfigCell, ConfigPoller, EffectiveConfig, Scheduler, Transmitter};
use disttrace_probe::StubProber;
use disttrace_proto::AgentCredentials;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

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
#[command(name = "disttrace-agent", about = "dist-traceroute measurement agent")]
struct Cli {
    /// Coordinator hostname or IP.
    #[arg(long)]
    master: String,

    /// Coordinator port.
    #[arg(long = "master-port", default_value_t = 8990)]
    master_port: u16,

    /// This agent's registered name.
    #[arg(long)]
    name: String,

    /// This agent's shared secret.
    #[arg(long)]
    secret: String,

    /// Log file path; defaults to stdout.
    #[arg(long)]
    log: Option<PathBuf>,

    #[arg(long = "loglevel", value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,

    /// Injects one synthetic traceroute result into the transmit queue at
    /// startup, for manual end-to-end testing. Developer-only: the original
    /// implementation's equivalent flag (`--zDebugResults`) ships with
    /// hard-coded legacy credentials in its sample payload, so this is
    /// compiled out of release builds.
    #[cfg(debug_assertions)]
    #[arg(long = "debug-results")]
    debug_results: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::new(format!("disttrace_agent={0},disttrace_probe={0}", cli.loglevel.as_directive()));
    let registry = tracing_subscriber::registry().with(filter);
    match &cli.log {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            registry.with(fmt::layer().with_writer(file).with_ansi(false)).init();
        }
        None => {
            registry.with(fmt::layer()).init();
        }
    }

    info!(master = %cli.master, port = cli.master_port, name = %cli.name, "starting disttrace-agent");

    let credentials = AgentCredentials {
        id: Uuid::new_v4(),
        name: cli.name.clone(),
        secret: cli.secret.clone(),
    };

    let config_cell = ConfigCell::new(EffectiveConfig::empty());
    let poller = ConfigPoller::new(&cli.master, cli.master_port, credentials.clone(), config_cell.clone());

    let (queue, receiver) = channel();
    let prober = Arc::new(StubProber::new());
    let scheduler = Scheduler::new(credentials.clone(), config_cell, prober, queue.clone());
    let transmitter = Transmitter::new(&cli.master, cli.master_port);

    #[cfg(debug_assertions)]
    if cli.debug_results {
        inject_debug_result(&queue);
    }

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone());

    // Shutdown order (spec §4.J): config poller, then scheduler, then
    // transmitter. All three watch the same cancellation token, so in
    // practice they wind down concurrently; `tokio::join!` here simply
    // waits for every task's own graceful-exit path to complete before the
    // process exits.
    tokio::join!(
        poller.run(cancel.clone()),
        scheduler.run(cancel.clone()),
        transmitter.run(receiver, cancel),
    );

    info!("disttrace-agent shut down cleanly");
    Ok(())
}

#[cfg(debug_assertions)]
fn inject_debug_result(queue: &disttrace_agent::TxQueueHandle) {
    use disttrace_proto::{SubmitResultRequest, SubmittedHop, Target};
    use tracing::warn;

    warn!("--debug-results: injecting synthetic traceroute result (developer builds only)");

    // The original implementation's debug-results path hard-codes a legacy
    // agent/secret pair in its sample payload; preserved here for parity but
    // confined to debug builds per spec §9.
    let slave = AgentCredentials {
        id: Uuid::new_v4(),
        name: "devtest".to_string(),
        secret: "devtest".to_string(),
    };

    let target = Target {
        id: Uuid::new_v4(),
        name: "loopback".to_string(),
        address: "127.0.0.1".to_string(),
        retries: 0,
        max_hops: 1,
        timeout_ms: 500,
    };

    queue.enqueue(SubmitResultRequest {
        slave,
        id: Uuid::new_v4(),
        date_time: chrono::Utc::now(),
        target,
        success: true,
        hop_count: 1,
        hops: vec![SubmittedHop {
            success: true,
            address: disttrace_agent::scheduler::loopback_hop_address(),
            host: "localhost".to_string(),
            n: 1,
            elapsed_time_nanos: 1_000_000,
            ttl: 0,
        }],
    });
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
