use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use console_core::load_console_config;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};

mod app;
mod http_gateway;
mod subscription;
mod ui;

use app::ConsoleApp;
use http_gateway::{spawn_http_workers, HttpGateway, ServiceEndpoints};
use subscription::{run_subscription, SubscriptionEvent};

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Crowd monitoring operations console", long_about = None)]
struct Cli {
    /// Base URL of the simulation service.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    simulation_url: String,
    /// Base URL of the density predictor.
    #[arg(long, default_value = "http://127.0.0.1:8001")]
    predictor_url: String,
    /// WebSocket pushing complete entity snapshots.
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws")]
    ws_url: String,
    /// Console config JSON; overrides CROWD_CONSOLE_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Concurrent HTTP requests in flight.
    #[arg(long, default_value_t = 4)]
    http_workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let (config, metadata) = load_console_config(cli.config.as_deref());
    info!(
        simulation = %cli.simulation_url,
        predictor = %cli.predictor_url,
        config = ?metadata.path(),
        "console.starting"
    );

    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
    let endpoints = ServiceEndpoints::new(cli.simulation_url.clone(), cli.predictor_url.clone());
    let _workers = spawn_http_workers(cli.http_workers, endpoints, request_rx, completion_tx)?;

    let (snapshot_tx, snapshot_rx) = unbounded_channel::<SubscriptionEvent>();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let gateway = HttpGateway::new(request_tx);
    let _ui_handle = std::thread::spawn(move || -> color_eyre::Result<()> {
        let app = ConsoleApp::new(config, snapshot_rx, gateway, completion_rx, shutdown_tx, log_rx)?;
        app.run()
    });

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("console.shutdown");
            break;
        }
        match run_subscription(cli.ws_url.clone(), snapshot_tx.clone()).await {
            Ok(()) => {
                info!(url = %cli.ws_url, "subscription.closed");
            }
            Err(err) => {
                warn!(url = %cli.ws_url, error = %err, "subscription.failed");
            }
        }
        if snapshot_tx.send(SubscriptionEvent::Lost).is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    Ok(())
}
