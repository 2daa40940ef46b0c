use tracing::{debug, error, info};

use crate::error::{PmdError, WriteError};
use crate::pmd::{encode_command, ControlCommand, MeasurementType};
use crate::session::PolarH10;
use crate::signal::SessionSignal;
use crate::transport::PmdTransport;


impl<T: PmdTransport> PolarH10<T> {
    /// Writes `[command, measurement]` to the PMD control point.
    pub async fn send_command(
        &mut self,
        command: ControlCommand,
        measurement: MeasurementType,
    ) -> Result<(), WriteError> {
        if !self.is_connected() {
            return Err(WriteError::NotConnected);
        }

        let frame = encode_command(command, measurement);
        debug!(?command, %measurement, ?frame, "writing control point");
        self.transport
            .write_control(&frame)
            .await
            .map_err(WriteError::Rejected)
    }

    /// Clears the buffer, requests the measurement settings and starts the
    /// stream after the configured settle delay.
    pub async fn start_recording(&mut self, measurement: MeasurementType) -> Result<(), PmdError> {
        if !self.is_connected() {
            return Err(WriteError::NotConnected.into());
        }
        if self.recording {
            self.warn_observer(format!("start requested while already recording, resending start for {measurement}"));
        }

        // chunks still in flight belong to the previous session
        self.flush_notifications().await;
        self.buffer.clear();

        if let Err(err) = self.send_command(ControlCommand::RequestSettings, measurement).await {
            error!(%err, "error requesting measurement settings");
            return Err(err.into());
        }
        tokio::time::sleep(self.config.settle_delay).await;

        if let Err(err) = self.send_command(ControlCommand::Start, measurement).await {
            error!(%err, "error starting measurement");
            return Err(err.into());
        }

        self.recording = true;
        info!(%measurement, "started recording");
        self.signal(SessionSignal::RecordingStarted(measurement));
        Ok(())
    }

    pub async fn stop_recording(&mut self, measurement: MeasurementType) -> Result<(), PmdError> {
        if !self.recording && self.is_connected() {
            self.warn_observer(format!("stop requested while not recording, sending stop for {measurement}"));
        }

        let result = self.send_command(ControlCommand::Stop, measurement).await;
        self.recording = false;

        if let Err(err) = result {
            error!(%err, "error stopping recording");
            return Err(err.into());
        }

        info!(%measurement, "stopped recording");
        self.signal(SessionSignal::RecordingStopped(measurement));
        Ok(())
    }

    /// Returns everything received since the last start or drain and empties
    /// the buffer. Chunks the transport delivered before the call are included.
    pub async fn get_data(&mut self) -> Vec<u8> {
        self.flush_notifications().await;
        self.buffer.drain()
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::tests::session;

    #[tokio::test]
    async fn send_command_writes_exact_frames() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();

        let mut expected = vec![];
        for command in ControlCommand::ALL {
            for measurement in MeasurementType::ALL {
                session.send_command(command, measurement).await.unwrap();
                expected.push(vec![command.as_byte(), measurement.as_byte()]);
            }
        }

        let writes = controller.writes();
        assert_eq!(writes.len(), 12);
        assert!(writes.iter().all(|frame| frame.len() == 2));
        assert_eq!(writes, expected);
    }

    #[tokio::test]
    async fn send_command_requires_connection() {
        let (mut session, controller) = session();
        let err = session
            .send_command(ControlCommand::Start, MeasurementType::Ecg)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::NotConnected));
        assert!(controller.writes().is_empty());
    }

    #[tokio::test]
    async fn start_sends_settings_then_start() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();

        session.start_recording(MeasurementType::Ecg).await.unwrap();
        assert!(session.is_recording());
        assert_eq!(controller.writes(), vec![vec![0x01, 0x00], vec![0x02, 0x00]]);

        session.stop_recording(MeasurementType::Ecg).await.unwrap();
        assert!(!session.is_recording());
        assert_eq!(controller.writes().last(), Some(&vec![0x03, 0x00]));
    }

    #[tokio::test(start_paused = true)]
    async fn start_waits_settle_delay() {
        let (mut session, controller) = session();
        session.config.settle_delay = Duration::from_millis(100);
        session.connect().await.unwrap();

        let before = tokio::time::Instant::now();
        session.start_recording(MeasurementType::Ppg).await.unwrap();
        assert!(before.elapsed() >= Duration::from_millis(100));
        assert_eq!(controller.writes(), vec![vec![0x01, 0x01], vec![0x02, 0x01]]);
    }

    #[tokio::test]
    async fn failed_start_leaves_recording_off() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();
        controller.fail_write(true);

        let err = session.start_recording(MeasurementType::Ecg).await.unwrap_err();
        assert!(matches!(err, PmdError::WriteFailure(WriteError::Rejected(_))));
        assert!(!session.is_recording());
        assert!(controller.writes().is_empty());
    }

    #[tokio::test]
    async fn start_and_stop_fail_when_disconnected() {
        let (mut session, _) = session();

        let err = session.start_recording(MeasurementType::Ecg).await.unwrap_err();
        assert!(matches!(err, PmdError::WriteFailure(WriteError::NotConnected)));

        let err = session.stop_recording(MeasurementType::Ecg).await.unwrap_err();
        assert!(matches!(err, PmdError::WriteFailure(WriteError::NotConnected)));
        assert!(!session.is_recording());
    }

    #[tokio::test]
    async fn stop_clears_flag_even_on_failure() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();
        session.start_recording(MeasurementType::Ecg).await.unwrap();

        controller.fail_write(true);
        assert!(session.stop_recording(MeasurementType::Ecg).await.is_err());
        assert!(!session.is_recording());
    }

    #[tokio::test]
    async fn get_data_concatenates_chunks_in_order() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();
        session.start_recording(MeasurementType::Ecg).await.unwrap();

        let chunks: [&[u8]; 4] = [&[0x00, 0xEA, 0x1C], &[0xAC, 0xCC], &[0x3F], &[0x00, 0x01, 0x02, 0x03]];
        for chunk in chunks {
            assert!(controller.notify(chunk));
        }
        session.stop_recording(MeasurementType::Ecg).await.unwrap();

        assert_eq!(session.get_data().await, chunks.concat());
        assert!(session.get_data().await.is_empty());
    }

    #[tokio::test]
    async fn tail_delivered_right_before_stop_is_kept() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();
        session.start_recording(MeasurementType::Ecg).await.unwrap();

        controller.notify(&[1, 2, 3]);
        controller.notify(&[4, 5]);
        session.stop_recording(MeasurementType::Ecg).await.unwrap();

        assert_eq!(session.get_data().await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn start_discards_previous_session_data() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();

        session.start_recording(MeasurementType::Ecg).await.unwrap();
        controller.notify(&[9, 9, 9]);
        session.stop_recording(MeasurementType::Ecg).await.unwrap();

        session.start_recording(MeasurementType::Accelerometer).await.unwrap();
        assert_eq!(session.buffered_len(), 0);
        controller.notify(&[1]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.get_data().await, vec![1]);
    }

    #[tokio::test]
    async fn flushes_in_flight_chunks_without_yielding_first() {
        let (mut session, controller) = session();
        session.connect().await.unwrap();
        session.start_recording(MeasurementType::Ecg).await.unwrap();

        for i in 0..50u8 {
            controller.notify(&[i]);
        }
        assert_eq!(session.get_data().await, (0..50u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn repeated_start_warns_but_resends() {
        let (observer, mut signals) = tokio::sync::mpsc::channel(16);
        let (session, controller) = session();
        let mut session = session.with_observer(observer);
        session.connect().await.unwrap();

        session.start_recording(MeasurementType::Ecg).await.unwrap();
        session.start_recording(MeasurementType::Ecg).await.unwrap();
        assert_eq!(controller.writes().len(), 4);

        let mut warned = false;
        while let Ok(signal) = signals.try_recv() {
            warned |= matches!(signal, SessionSignal::Warning(_));
        }
        assert!(warned);
    }
}
