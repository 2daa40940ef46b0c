use std::str::FromStr;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};


/// Installs the console subscriber. `RUST_LOG` wins over `level`.
pub fn init_logger(level: &str) {
    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(level_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
