use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{SessionConfig, DEFAULT_NAME_PATTERN};
use crate::pmd::MeasurementType;


/// Record raw PMD data from a Polar H10 until Enter is pressed.
#[derive(Parser, Debug)]
#[command(name = "polar_h10", version, about)]
pub struct Args {
    /// Substring of the advertised device name
    #[arg(long, default_value = DEFAULT_NAME_PATTERN)]
    pub name: String,

    /// Scan duration in seconds
    #[arg(long, default_value_t = 5)]
    pub scan_secs: u64,

    /// Delay between the settings request and the start command, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub settle_ms: u64,

    /// Measurement to stream: ecg, ppg, acc or hr
    #[arg(long, short, default_value = "ecg")]
    pub measurement: MeasurementType,

    /// Directory the recording is written to
    #[arg(long, short, default_value = ".")]
    pub output_dir: PathBuf,

    /// Use a simulated strap instead of the Bluetooth adapter
    #[arg(long)]
    pub simulate: bool,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            name_pattern: self.name.clone(),
            scan_timeout: Duration::from_secs(self.scan_secs),
            settle_delay: Duration::from_millis(self.settle_ms),
        }
    }
}
