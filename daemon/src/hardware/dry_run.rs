//! Backend that only logs, for running the daemon away from the brick

use tracing::info;

use super::{Actuator, Hardware, HardwareError, LedColor, LedSide};
use crate::sound::Tone;

#[derive(Debug, Default)]
pub struct DryRunHardware;

impl DryRunHardware {
    pub fn new() -> Self {
        Self
    }
}

impl Hardware for DryRunHardware {
    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), HardwareError> {
        let song = tones
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        info!(%song, "dry-run: play tones");
        Ok(())
    }

    fn set_led(&mut self, side: LedSide, color: LedColor) -> Result<(), HardwareError> {
        info!(%side, %color, "dry-run: set led");
        Ok(())
    }

    fn rotate(
        &mut self,
        actuator: Actuator,
        speed_percent: u8,
        degrees: f64,
    ) -> Result<(), HardwareError> {
        info!(%actuator, speed_percent, degrees, "dry-run: rotate");
        Ok(())
    }

    fn stop(&mut self, actuator: Actuator) -> Result<(), HardwareError> {
        info!(%actuator, "dry-run: stop");
        Ok(())
    }
}
