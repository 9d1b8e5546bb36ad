pub mod activity;
pub mod control;
pub mod hashing;
pub mod metrics;
pub mod models;
pub mod output;
pub mod session;
pub mod settings;
pub mod utils;
pub mod watch;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use control::WatchController;
use metrics::sysinfo_probe_factory;
use output::{OutputLayout, OutputStore};
use session::SessionContext;
use settings::{CliArgs, HarnessSettings};

/// Parse the command line and run the harness until Ctrl-C.
pub fn run() -> Result<()> {
    let cli = CliArgs::parse();
    utils::logging::init(cli.verbose);

    let settings = HarnessSettings::resolve(&cli)?;

    // One thread multiplexes every session; blocking work goes to the
    // blocking pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(serve_harness(settings))
}

pub async fn serve_harness(settings: HarnessSettings) -> Result<()> {
    let layout = OutputLayout::prepare(&settings.outdir, Local::now())?;
    let output = OutputStore::open(layout)?;

    let ctx = SessionContext::new(
        settings.monitor_settings(),
        output.clone(),
        sysinfo_probe_factory(),
    );
    let controller = WatchController::new(ctx);

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind control channel on {address}"))?;
    info!("Harness started on {address}");

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(control::serve(listener, controller.clone(), shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Harness stopped by user");

    shutdown.cancel();
    server
        .await
        .context("control channel task failed to join")??;

    let outcomes = controller.shutdown().await;
    info!("{} sessions finalized during shutdown", outcomes.len());

    output.close().await?;
    info!("Results saved to {}", output.layout().results_dir.display());
    Ok(())
}
