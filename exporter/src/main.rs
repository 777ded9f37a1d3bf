mod server;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use remote_node_exporter_core::channel::ssh::SshConnector;
use remote_node_exporter_core::channel::CommandChannel;
use remote_node_exporter_core::config::ExporterConfig;
use remote_node_exporter_core::preread::SourceRegistry;
use remote_node_exporter_core::NodeCollector;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("Usage: remote-node-exporter [--once]");
    eprintln!();
    eprintln!("Serves the metrics of the host named by SSH_HOST on 0.0.0.0:$PORT.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --once      Collect once, print to stdout and exit");
    eprintln!("  --version   Print version and exit");
    eprintln!("  --help      Print this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let once = match args.get(1).map(String::as_str) {
        None => false,
        Some("--once") => true,
        Some("--version") => {
            println!("remote-node-exporter {}", VERSION);
            return Ok(());
        }
        Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            eprintln!("Unknown option: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    // Logs go to stderr so `--once` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ExporterConfig::from_env().context("invalid configuration")?;
    info!(
        "remote-node-exporter {} collecting from {}",
        VERSION,
        config.ssh.destination()
    );

    let channel = CommandChannel::new(Box::new(SshConnector::new(config.ssh.clone())));
    let mut collector = NodeCollector::new(
        channel,
        SourceRegistry::new(config.textfile_path.as_deref()),
        &config.extra_collectors,
    );

    if once {
        let text = tokio::task::spawn_blocking(move || collector.collect()).await?;
        print!("{text}");
        return Ok(());
    }

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("cannot listen on port {}", config.listen_port))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {e}"),
        }
    });

    server::serve(listener, Arc::new(Mutex::new(collector)), shutdown).await
}
