//! Measurement runner.
//!
//! Connects to a wavefront sensor, configures it, takes a number of
//! measurements and disconnects, logging the radius of curvature of each.
//!
//! # Usage
//!
//! ```bash
//! # Ten measurements on the first listed sensor
//! rust_wfs --iterations 10
//!
//! # Settings from a specific file, library from a non-standard location
//! rust_wfs --config lab.yaml --library /opt/thorlabs/lib/libWFS_64.so
//!
//! # Exercise the pipeline without hardware
//! rust_wfs --mock --iterations 3
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rust_wfs::config::Settings;
use rust_wfs::driver::Wfs;
use rust_wfs::logging;
use rust_wfs::sdk::{MockWfsSdk, WfsSdk};
use rust_wfs::worker::{WfsWorker, DEFAULT_QUEUE};
use tracing::{info, warn};

/// Shack-Hartmann wavefront sensor measurement runner
#[derive(Parser, Debug)]
#[command(name = "rust_wfs")]
#[command(version)]
#[command(about = "Run connect, config and repeated updates on a wavefront sensor", long_about = None)]
struct Args {
    /// YAML settings file (default: $WFS_CONFIG, $LOG_CFG or wfs.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of measurements to take
    #[arg(short = 'n', long, default_value_t = 1)]
    iterations: u32,

    /// Vendor library to load instead of the platform default
    #[arg(long, value_name = "PATH")]
    library: Option<PathBuf>,

    /// Use the simulated sensor instead of the vendor library
    #[arg(long)]
    mock: bool,

    /// Always take images at the configured exposure
    #[arg(long)]
    no_auto_exposure: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;
    if args.library.is_some() {
        settings.library.path.clone_from(&args.library);
    }
    if args.no_auto_exposure {
        settings.measurement.allow_auto_exposure = false;
    }

    logging::init(&settings.logging).context("Failed to initialise logging")?;

    if args.mock {
        run(Wfs::new(MockWfsSdk::new()), &settings, args.iterations).await
    } else {
        let wfs = Wfs::load(settings.library.path.as_deref())
            .context("Failed to load the WFS library")?;
        run(wfs, &settings, args.iterations).await
    }
}

async fn run<S: WfsSdk + 'static>(wfs: Wfs<S>, settings: &Settings, iterations: u32) -> Result<()> {
    let (client, worker) = WfsWorker::new(wfs).spawn(DEFAULT_QUEUE);

    let connected = client
        .connect(settings.measurement.resource_name.clone())
        .await
        .context("Failed to connect")?;
    info!(
        instrument = %connected.value.name,
        serial = %connected.value.serial_wfs,
        device_status = %connected.device_status,
        "sensor ready"
    );

    let configured = client.configure(settings.measurement.clone()).await?;
    if let Some(step) = configured.first_failure() {
        warn!(op = step.op, message = %step.status.message, "configuration incomplete");
    }

    for i in 1..=iterations {
        let measurement = client.update().await?;
        match measurement.first_failure() {
            None => info!(
                iteration = i,
                roc_mm = measurement.value,
                device_status = %measurement.device_status,
                "measurement"
            ),
            Some(step) => warn!(
                iteration = i,
                roc_mm = measurement.value,
                op = step.op,
                message = %step.status.message,
                "measurement incomplete"
            ),
        }
    }

    let closed = client.disconnect().await?;
    client.shutdown().await?;
    worker.await.context("WFS worker task panicked")?;

    if !closed.value.is_ok() {
        bail!("close failed: {}", closed.value.message);
    }
    Ok(())
}
