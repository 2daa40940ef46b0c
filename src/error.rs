use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a [`crate::transport::PmdTransport`].
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("no bluetooth adapter found")]
    NoAdapter,

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("characteristic {0} not found on device")]
    MissingCharacteristic(Uuid),

    #[error("transport is not connected")]
    NotConnected,

    #[error("simulated failure: {0}")]
    Simulated(String),
}

/// Failure to deliver a frame to the PMD control point.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("not connected to a device")]
    NotConnected,

    #[error("control point write rejected: {0}")]
    Rejected(#[source] TransportError),
}

#[derive(Error, Debug)]
pub enum PmdError {
    #[error("no device advertising a name containing {pattern:?} was found")]
    DiscoveryNotFound { pattern: String },

    #[error("scan failed: {0}")]
    Scan(#[source] TransportError),

    #[error("connection failed: {0}")]
    ConnectionFailure(#[source] TransportError),

    #[error(transparent)]
    WriteFailure(#[from] WriteError),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_human_readable() {
        let err = PmdError::DiscoveryNotFound { pattern: "Polar H10".to_string() };
        assert_eq!(
            err.to_string(),
            "no device advertising a name containing \"Polar H10\" was found"
        );

        let err = PmdError::from(WriteError::NotConnected);
        assert_eq!(err.to_string(), "not connected to a device");

        let err = PmdError::ConnectionFailure(TransportError::NoAdapter);
        assert_eq!(err.to_string(), "connection failed: no bluetooth adapter found");

        let err = WriteError::Rejected(TransportError::Simulated("gatt busy".to_string()));
        assert_eq!(err.to_string(), "control point write rejected: simulated failure: gatt busy");
    }
}
