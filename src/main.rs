use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::spawn;
use tokio::sync::mpsc;
use tracing::{debug, error};

use polar_h10::btle::BtleplugTransport;
use polar_h10::cli::Args;
use polar_h10::fake::FakeTransport;
use polar_h10::logging::init_logger;
use polar_h10::recording::save_recording;
use polar_h10::{PmdTransport, PolarH10, SessionSignal};

// roughly the frame size and rate of an H10 ECG stream
const SIMULATED_CHUNK_LEN: usize = 229;
const SIMULATED_INTERVAL: Duration = Duration::from_millis(550);


#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(&args.log_level);

    let (tx, mut rx) = mpsc::channel::<SessionSignal>(128);
    spawn(async move {
        while let Some(signal) = rx.recv().await {
            debug!(?signal, "session signal");
        }
    });

    let result = if args.simulate {
        let transport = FakeTransport::polar_h10()
            .with_generated_data(SIMULATED_INTERVAL, SIMULATED_CHUNK_LEN);
        run(PolarH10::new(transport, args.session_config()).with_observer(tx), &args).await
    } else {
        match BtleplugTransport::new().await {
            Ok(transport) => {
                run(PolarH10::new(transport, args.session_config()).with_observer(tx), &args).await
            }
            Err(err) => Err(anyhow::Error::new(err).context("Could not open the Bluetooth adapter")),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("An error occurred: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Records one session and always disconnects afterwards.
async fn run<T: PmdTransport>(mut polar: PolarH10<T>, args: &Args) -> Result<()> {
    let outcome = record(&mut polar, args).await;
    polar.disconnect().await;
    outcome
}

async fn record<T: PmdTransport>(polar: &mut PolarH10<T>, args: &Args) -> Result<()> {
    polar.connect().await.context("Could not connect to Polar H10")?;

    polar.set_notification_sink(|chunk| println!("Received {} bytes of data", chunk.len()));

    println!("Starting {} recording... Press Enter to stop", args.measurement);
    polar.start_recording(args.measurement).await?;

    wait_for_enter().await?;

    polar.stop_recording(args.measurement).await?;

    let data = polar.get_data().await;
    let path = save_recording(&args.output_dir, &data, Local::now())?;
    println!("Saved {} bytes of data to {}", data.len(), path.display());

    Ok(())
}

async fn wait_for_enter() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await?
    .context("Failed to read from stdin")
}
