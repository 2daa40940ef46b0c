//! Raw PMD recording from a Polar H10 chest strap over BLE.
//!
//! [`PolarH10`] connects through a [`PmdTransport`], writes the PMD control
//! frames that start and stop a measurement stream and accumulates the data
//! notifications as opaque bytes.

pub mod btle;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod control;
pub mod error;
pub mod fake;
pub mod logging;
pub mod pmd;
pub mod recording;
pub mod session;
pub mod signal;
pub mod transport;

pub use config::SessionConfig;
pub use error::{PmdError, TransportError, WriteError};
pub use pmd::{ControlCommand, MeasurementType};
pub use buffer::NotificationSink;
pub use session::PolarH10;
pub use signal::SessionSignal;
pub use transport::{DeviceHandle, PmdTransport};
