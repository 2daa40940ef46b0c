use std::fmt;
use std::str::FromStr;

use uuid::Uuid;


pub const PMD_SERVICE_UUID: Uuid = Uuid::from_u128(0xFB005C80_02E7_F387_1CAD_8ACD2D8DF0C8);
pub const PMD_CONTROL_UUID: Uuid = Uuid::from_u128(0xFB005C81_02E7_F387_1CAD_8ACD2D8DF0C8);
pub const PMD_DATA_UUID: Uuid = Uuid::from_u128(0xFB005C82_02E7_F387_1CAD_8ACD2D8DF0C8);


/// Op codes written to the PMD control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCommand {
    RequestSettings = 0x01,
    Start = 0x02,
    Stop = 0x03,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 3] = [
        ControlCommand::RequestSettings,
        ControlCommand::Start,
        ControlCommand::Stop,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MeasurementType {
    #[default]
    Ecg = 0x00,
    Ppg = 0x01,
    Accelerometer = 0x02,
    HeartRate = 0x03,
}

impl MeasurementType {
    pub const ALL: [MeasurementType; 4] = [
        MeasurementType::Ecg,
        MeasurementType::Ppg,
        MeasurementType::Accelerometer,
        MeasurementType::HeartRate,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasurementType::Ecg => "ecg",
            MeasurementType::Ppg => "ppg",
            MeasurementType::Accelerometer => "acc",
            MeasurementType::HeartRate => "hr",
        };
        f.write_str(name)
    }
}

impl FromStr for MeasurementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecg" => Ok(MeasurementType::Ecg),
            "ppg" => Ok(MeasurementType::Ppg),
            "acc" | "accelerometer" => Ok(MeasurementType::Accelerometer),
            "hr" | "heart-rate" | "heartrate" => Ok(MeasurementType::HeartRate),
            other => Err(format!("unknown measurement type '{other}' (expected ecg, ppg, acc or hr)")),
        }
    }
}

/// Builds the two byte control point frame. Command byte comes first.
pub fn encode_command(command: ControlCommand, measurement: MeasurementType) -> [u8; 2] {
    [command.as_byte(), measurement.as_byte()]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_frame_is_command_then_type() {
        let expected: [(ControlCommand, MeasurementType, [u8; 2]); 12] = [
            (ControlCommand::RequestSettings, MeasurementType::Ecg, [0x01, 0x00]),
            (ControlCommand::RequestSettings, MeasurementType::Ppg, [0x01, 0x01]),
            (ControlCommand::RequestSettings, MeasurementType::Accelerometer, [0x01, 0x02]),
            (ControlCommand::RequestSettings, MeasurementType::HeartRate, [0x01, 0x03]),
            (ControlCommand::Start, MeasurementType::Ecg, [0x02, 0x00]),
            (ControlCommand::Start, MeasurementType::Ppg, [0x02, 0x01]),
            (ControlCommand::Start, MeasurementType::Accelerometer, [0x02, 0x02]),
            (ControlCommand::Start, MeasurementType::HeartRate, [0x02, 0x03]),
            (ControlCommand::Stop, MeasurementType::Ecg, [0x03, 0x00]),
            (ControlCommand::Stop, MeasurementType::Ppg, [0x03, 0x01]),
            (ControlCommand::Stop, MeasurementType::Accelerometer, [0x03, 0x02]),
            (ControlCommand::Stop, MeasurementType::HeartRate, [0x03, 0x03]),
        ];

        for (command, measurement, frame) in expected {
            assert_eq!(encode_command(command, measurement), frame, "{command:?} {measurement:?}");
        }
    }

    #[test]
    fn uuids_match_polar_layout() {
        assert_eq!(
            PMD_SERVICE_UUID.to_string().to_uppercase(),
            "FB005C80-02E7-F387-1CAD-8ACD2D8DF0C8"
        );
        assert_eq!(
            PMD_CONTROL_UUID.to_string().to_uppercase(),
            "FB005C81-02E7-F387-1CAD-8ACD2D8DF0C8"
        );
        assert_eq!(
            PMD_DATA_UUID.to_string().to_uppercase(),
            "FB005C82-02E7-F387-1CAD-8ACD2D8DF0C8"
        );
    }

    #[test]
    fn measurement_type_parses_cli_names() {
        assert_eq!("ecg".parse::<MeasurementType>(), Ok(MeasurementType::Ecg));
        assert_eq!("PPG".parse::<MeasurementType>(), Ok(MeasurementType::Ppg));
        assert_eq!("acc".parse::<MeasurementType>(), Ok(MeasurementType::Accelerometer));
        assert_eq!("hr".parse::<MeasurementType>(), Ok(MeasurementType::HeartRate));
        assert!("emg".parse::<MeasurementType>().is_err());

        for measurement in MeasurementType::ALL {
            assert_eq!(measurement.to_string().parse::<MeasurementType>(), Ok(measurement));
        }
    }
}
