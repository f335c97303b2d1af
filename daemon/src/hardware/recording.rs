//! Test double that records every hardware call

use std::sync::{Arc, Mutex};

use super::{Actuator, Hardware, HardwareError, LedColor, LedSide};
use crate::sound::Tone;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PlayTones(Vec<Tone>),
    SetLed(LedSide, LedColor),
    Rotate(Actuator, u8, f64),
    Stop(Actuator),
}

/// Records calls into a shared log so tests can inspect them after the
/// hardware has been moved into a controller or worker thread
#[derive(Debug, Clone, Default)]
pub struct RecordingHardware {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_rotate: bool,
}

impl RecordingHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `rotate` call fails with a motor timeout
    pub fn failing_rotate() -> Self {
        Self {
            fail_rotate: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn rotations(&self) -> Vec<(Actuator, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Rotate(actuator, _, degrees) => Some((actuator, degrees)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Hardware for RecordingHardware {
    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), HardwareError> {
        self.record(Call::PlayTones(tones.to_vec()));
        Ok(())
    }

    fn set_led(&mut self, side: LedSide, color: LedColor) -> Result<(), HardwareError> {
        self.record(Call::SetLed(side, color));
        Ok(())
    }

    fn rotate(
        &mut self,
        actuator: Actuator,
        speed_percent: u8,
        degrees: f64,
    ) -> Result<(), HardwareError> {
        self.record(Call::Rotate(actuator, speed_percent, degrees));
        if self.fail_rotate {
            return Err(HardwareError::MotorTimeout { actuator });
        }
        Ok(())
    }

    fn stop(&mut self, actuator: Actuator) -> Result<(), HardwareError> {
        self.record(Call::Stop(actuator));
        Ok(())
    }
}
