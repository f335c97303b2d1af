//! Hardware port for the gadget's actuators, LEDs and speaker
//!
//! The controller only talks to the brick through the [`Hardware`] trait.
//! Two backends are provided:
//! - [`Ev3devHardware`]: ev3dev sysfs attributes plus the `beep` utility
//! - [`DryRunHardware`]: logs every call, for running off-brick

mod dry_run;
mod ev3dev;
#[cfg(test)]
pub mod recording;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sound::Tone;

pub use dry_run::DryRunHardware;
pub use ev3dev::Ev3devHardware;

/// One of the two flag motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actuator {
    /// Direct-drive motor on output port A
    Primary,
    /// Geared motor on output port B
    Secondary,
}

impl Actuator {
    pub const ALL: [Actuator; 2] = [Actuator::Primary, Actuator::Secondary];

    /// ev3dev output port the motor is plugged into
    pub fn port(self) -> &'static str {
        match self {
            Actuator::Primary => "outA",
            Actuator::Secondary => "outB",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actuator::Primary => write!(f, "primary"),
            Actuator::Secondary => write!(f, "secondary"),
        }
    }
}

/// Brick status LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedSide {
    Left,
    Right,
}

impl LedSide {
    pub const BOTH: [LedSide; 2] = [LedSide::Left, LedSide::Right];

    fn index(self) -> u8 {
        match self {
            LedSide::Left => 0,
            LedSide::Right => 1,
        }
    }
}

impl fmt::Display for LedSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedSide::Left => write!(f, "LEFT"),
            LedSide::Right => write!(f, "RIGHT"),
        }
    }
}

/// Colors a bi-color (red/green) brick LED can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Black,
    Red,
    Green,
    Amber,
    Orange,
    Yellow,
}

impl LedColor {
    /// Relative (red, green) brightness
    pub fn mix(self) -> (f64, f64) {
        match self {
            LedColor::Black => (0.0, 0.0),
            LedColor::Red => (1.0, 0.0),
            LedColor::Green => (0.0, 1.0),
            LedColor::Amber => (1.0, 1.0),
            LedColor::Orange => (1.0, 0.5),
            LedColor::Yellow => (0.1, 1.0),
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedColor::Black => "BLACK",
            LedColor::Red => "RED",
            LedColor::Green => "GREEN",
            LedColor::Amber => "AMBER",
            LedColor::Orange => "ORANGE",
            LedColor::Yellow => "YELLOW",
        };
        f.write_str(name)
    }
}

/// Errors reported by a hardware backend
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("no tacho motor found on port {port}")]
    MotorNotFound { port: &'static str },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected value {value:?} in {path}")]
    InvalidAttribute { path: PathBuf, value: String },

    #[error("{actuator} motor did not finish moving")]
    MotorTimeout { actuator: Actuator },

    #[error("failed to run sound command {command:?}: {source}")]
    SoundSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sound command {command:?} exited with {status}")]
    SoundFailed { command: String, status: String },
}

/// Outbound operations the gadget can perform
///
/// Every call blocks until the hardware has finished the operation.
pub trait Hardware {
    /// Play a tone sequence on the speaker
    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), HardwareError>;

    /// Set one brick LED to a color
    fn set_led(&mut self, side: LedSide, color: LedColor) -> Result<(), HardwareError>;

    /// Rotate a motor by `degrees` at `speed_percent` of its max speed
    fn rotate(
        &mut self,
        actuator: Actuator,
        speed_percent: u8,
        degrees: f64,
    ) -> Result<(), HardwareError>;

    /// Stop a motor
    fn stop(&mut self, actuator: Actuator) -> Result<(), HardwareError>;

    /// Set both LEDs to the same color
    fn set_leds(&mut self, color: LedColor) -> Result<(), HardwareError> {
        for side in LedSide::BOTH {
            self.set_led(side, color)?;
        }
        Ok(())
    }

    /// Stop both motors
    fn stop_all(&mut self) -> Result<(), HardwareError> {
        for actuator in Actuator::ALL {
            self.stop(actuator)?;
        }
        Ok(())
    }
}

impl<H: Hardware + ?Sized> Hardware for Box<H> {
    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), HardwareError> {
        (**self).play_tones(tones)
    }

    fn set_led(&mut self, side: LedSide, color: LedColor) -> Result<(), HardwareError> {
        (**self).set_led(side, color)
    }

    fn rotate(
        &mut self,
        actuator: Actuator,
        speed_percent: u8,
        degrees: f64,
    ) -> Result<(), HardwareError> {
        (**self).rotate(actuator, speed_percent, degrees)
    }

    fn stop(&mut self, actuator: Actuator) -> Result<(), HardwareError> {
        (**self).stop(actuator)
    }
}
