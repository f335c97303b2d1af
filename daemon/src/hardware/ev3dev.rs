//! ev3dev backend: sysfs attributes for motors and LEDs, `beep` for sound
//!
//! Motor and LED classes live under `/sys/class` on the brick. The root is
//! configurable so the backend can be pointed at a fake tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{Actuator, Hardware, HardwareError, LedColor, LedSide};
use crate::sound::{Tempo, Tone};

/// Silence between consecutive notes
const NOTE_GAP: Duration = Duration::from_millis(50);

/// How often a running motor's state is polled
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long the driver may take to report `running` after a command
const START_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper bound on a single relative move
const MOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// A tacho motor found under `tacho-motor/`
#[derive(Debug)]
struct TachoMotor {
    dir: PathBuf,
    max_speed: i64,
    count_per_rot: i64,
}

impl TachoMotor {
    /// Find the motor whose `address` ends with the actuator's port
    fn find(root: &Path, actuator: Actuator) -> Result<Self, HardwareError> {
        let class_dir = root.join("tacho-motor");
        let entries = fs::read_dir(&class_dir).map_err(|source| HardwareError::Io {
            path: class_dir.clone(),
            source,
        })?;

        for entry in entries.flatten() {
            let dir = entry.path();
            let Ok(address) = fs::read_to_string(dir.join("address")) else {
                continue;
            };
            if address.trim().ends_with(actuator.port()) {
                let max_speed = read_number(&dir.join("max_speed"))?;
                let count_per_rot = read_number(&dir.join("count_per_rot"))?;
                debug!(?dir, %actuator, max_speed, count_per_rot, "found tacho motor");
                return Ok(Self {
                    dir,
                    max_speed,
                    count_per_rot,
                });
            }
        }

        Err(HardwareError::MotorNotFound {
            port: actuator.port(),
        })
    }

    fn speed_sp(&self, speed_percent: u8) -> i64 {
        self.max_speed * i64::from(speed_percent.min(100)) / 100
    }

    fn position_sp(&self, degrees: f64) -> i64 {
        (degrees * self.count_per_rot as f64 / 360.0).round() as i64
    }

    fn set(&self, attribute: &str, value: &str) -> Result<(), HardwareError> {
        write_attribute(&self.dir.join(attribute), value)
    }

    fn state_flags(&self) -> Result<Vec<String>, HardwareError> {
        let path = self.dir.join("state");
        let state = fs::read_to_string(&path).map_err(|source| HardwareError::Io { path, source })?;
        Ok(state.split_whitespace().map(str::to_string).collect())
    }

    fn is_running(&self) -> Result<bool, HardwareError> {
        Ok(self.state_flags()?.iter().any(|flag| flag == "running"))
    }

    fn is_moving(&self) -> Result<bool, HardwareError> {
        let flags = self.state_flags()?;
        Ok(flags.iter().any(|flag| flag == "running") && !flags.iter().any(|flag| flag == "stalled"))
    }
}

/// Hardware backend for an ev3dev brick
#[derive(Debug)]
pub struct Ev3devHardware {
    root: PathBuf,
    primary: TachoMotor,
    secondary: TachoMotor,
    beep_command: String,
    tempo: Tempo,
}

impl Ev3devHardware {
    /// Locate both flag motors under `root` (normally `/sys/class`)
    pub fn open(
        root: impl Into<PathBuf>,
        beep_command: impl Into<String>,
        tempo: Tempo,
    ) -> Result<Self, HardwareError> {
        let root = root.into();
        let primary = TachoMotor::find(&root, Actuator::Primary)?;
        let secondary = TachoMotor::find(&root, Actuator::Secondary)?;
        info!(?root, "ev3dev hardware ready");

        Ok(Self {
            root,
            primary,
            secondary,
            beep_command: beep_command.into(),
            tempo,
        })
    }

    fn motor(&self, actuator: Actuator) -> &TachoMotor {
        match actuator {
            Actuator::Primary => &self.primary,
            Actuator::Secondary => &self.secondary,
        }
    }

    fn led_dir(&self, side: LedSide, channel: &str) -> PathBuf {
        self.root
            .join("leds")
            .join(format!("led{}:{}:brick-status", side.index(), channel))
    }

    fn set_channel(&self, side: LedSide, channel: &str, level: f64) -> Result<(), HardwareError> {
        let dir = self.led_dir(side, channel);
        let max = read_number(&dir.join("max_brightness"))?;
        let brightness = (max as f64 * level).round() as i64;
        write_attribute(&dir.join("brightness"), &brightness.to_string())
    }
}

impl Hardware for Ev3devHardware {
    fn play_tones(&mut self, tones: &[Tone]) -> Result<(), HardwareError> {
        if tones.is_empty() {
            return Ok(());
        }

        let args = beep_args(tones, self.tempo);
        debug!(command = %self.beep_command, ?args, "playing tones");

        let status = Command::new(&self.beep_command)
            .args(&args)
            .status()
            .map_err(|source| HardwareError::SoundSpawn {
                command: self.beep_command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(HardwareError::SoundFailed {
                command: self.beep_command.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    fn set_led(&mut self, side: LedSide, color: LedColor) -> Result<(), HardwareError> {
        let (red, green) = color.mix();
        self.set_channel(side, "red", red)?;
        self.set_channel(side, "green", green)
    }

    fn rotate(
        &mut self,
        actuator: Actuator,
        speed_percent: u8,
        degrees: f64,
    ) -> Result<(), HardwareError> {
        let motor = self.motor(actuator);
        motor.set("speed_sp", &motor.speed_sp(speed_percent).to_string())?;
        motor.set("position_sp", &motor.position_sp(degrees).to_string())?;
        motor.set("stop_action", "brake")?;
        motor.set("command", "run-to-rel-pos")?;

        // The driver may not report `running` right after the command
        let started = Instant::now();
        while !motor.is_running()? && started.elapsed() < START_TIMEOUT {
            thread::sleep(POLL_INTERVAL);
        }

        while motor.is_moving()? {
            if started.elapsed() > MOVE_TIMEOUT {
                return Err(HardwareError::MotorTimeout { actuator });
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    fn stop(&mut self, actuator: Actuator) -> Result<(), HardwareError> {
        self.motor(actuator).set("command", "stop")
    }
}

/// Arguments for `beep`: one `-f -l -D` group per tone, separated by `-n`
fn beep_args(tones: &[Tone], tempo: Tempo) -> Vec<String> {
    let mut args = Vec::with_capacity(tones.len() * 7);
    for (i, tone) in tones.iter().enumerate() {
        if i > 0 {
            args.push("-n".to_string());
        }
        let length = tone.value.duration(tempo).saturating_sub(NOTE_GAP);
        args.push("-f".to_string());
        args.push(format!("{:.2}", tone.pitch.frequency()));
        args.push("-l".to_string());
        args.push(length.as_millis().to_string());
        args.push("-D".to_string());
        args.push(NOTE_GAP.as_millis().to_string());
    }
    args
}

fn read_number(path: &Path) -> Result<i64, HardwareError> {
    let raw = fs::read_to_string(path).map_err(|source| HardwareError::Io {
        path: path.to_owned(),
        source,
    })?;
    raw.trim()
        .parse()
        .map_err(|_| HardwareError::InvalidAttribute {
            path: path.to_owned(),
            value: raw.trim().to_string(),
        })
}

fn write_attribute(path: &Path, value: &str) -> Result<(), HardwareError> {
    fs::write(path, value).map_err(|source| HardwareError::Io {
        path: path.to_owned(),
        source,
    })
}
