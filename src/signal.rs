use crate::pmd::MeasurementType;


/// Session events pushed to an optional observer channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    DeviceFound(String),
    Connected(String),
    RecordingStarted(MeasurementType),
    RecordingStopped(MeasurementType),
    Disconnected,
    Warning(String),
}
