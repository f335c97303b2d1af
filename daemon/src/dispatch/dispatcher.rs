//! Applies state entries to the hardware through the dispatch table

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hardware::{Actuator, Hardware, HardwareError};
use crate::sound::Tone;

use super::table::{ActionSpec, DispatchTable, TIMEINFO};

/// One named state reported by the companion device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "name")]
    pub category: String,
    pub value: String,
}

impl StateEntry {
    pub fn new(category: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

/// Gear train between a motor and its flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GearRatio {
    /// Teeth on the motor gear
    pub driving: u32,
    /// Teeth on the flag gear
    pub driven: u32,
}

impl GearRatio {
    pub const DIRECT: GearRatio = GearRatio {
        driving: 1,
        driven: 1,
    };

    /// Motor degrees needed to turn the flag by `degrees`
    pub fn motor_degrees(&self, degrees: f64) -> f64 {
        degrees * f64::from(self.driven) / f64::from(self.driving.max(1))
    }
}

/// Settings the dispatcher is constructed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Motor speed, percent of max
    pub speed_percent: u8,
    pub primary_gear: GearRatio,
    pub secondary_gear: GearRatio,
}

impl DispatchConfig {
    pub fn gear(&self, actuator: Actuator) -> GearRatio {
        match actuator {
            Actuator::Primary => self.primary_gear,
            Actuator::Secondary => self.secondary_gear,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            speed_percent: 50,
            primary_gear: GearRatio::DIRECT,
            // 24 tooth gear on the motor driving a 28 tooth gear on the flag
            secondary_gear: GearRatio {
                driving: 24,
                driven: 28,
            },
        }
    }
}

/// What happened to a single state entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Tones played and a flag waved
    Performed {
        category: String,
        value: String,
        tones: Vec<Tone>,
        actuator: Actuator,
        /// Degrees the motor turned
        degrees: f64,
    },
    /// `timeinfo` value logged
    TimeInfo { value: String },
    /// No table entry for this pair
    Ignored { category: String, value: String },
}

/// Looks up each state entry and drives the hardware accordingly
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    table: DispatchTable,
    config: DispatchConfig,
}

impl EventDispatcher {
    pub fn new(table: DispatchTable, config: DispatchConfig) -> Self {
        Self { table, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Dispatch a batch in order, stopping at the first hardware error
    pub fn dispatch<H: Hardware + ?Sized>(
        &self,
        hardware: &mut H,
        entries: &[StateEntry],
    ) -> Result<Vec<DispatchOutcome>, HardwareError> {
        entries
            .iter()
            .map(|entry| self.dispatch_one(hardware, entry))
            .collect()
    }

    /// Dispatch a single entry
    pub fn dispatch_one<H: Hardware + ?Sized>(
        &self,
        hardware: &mut H,
        entry: &StateEntry,
    ) -> Result<DispatchOutcome, HardwareError> {
        if let Some(action) = self.table.lookup(&entry.category, &entry.value) {
            let degrees = self.perform(hardware, action)?;
            info!(
                category = %entry.category,
                value = %entry.value,
                actuator = %action.actuator,
                degrees,
                "state reaction performed"
            );
            return Ok(DispatchOutcome::Performed {
                category: entry.category.clone(),
                value: entry.value.clone(),
                tones: action.tones.to_vec(),
                actuator: action.actuator,
                degrees,
            });
        }

        if entry.category == TIMEINFO {
            info!(value = %entry.value, "time info");
            return Ok(DispatchOutcome::TimeInfo {
                value: entry.value.clone(),
            });
        }

        debug!(category = %entry.category, value = %entry.value, "no reaction for state");
        Ok(DispatchOutcome::Ignored {
            category: entry.category.clone(),
            value: entry.value.clone(),
        })
    }

    /// Play, move, then stop both motors. Returns the motor degrees.
    fn perform<H: Hardware + ?Sized>(
        &self,
        hardware: &mut H,
        action: &ActionSpec,
    ) -> Result<f64, HardwareError> {
        let degrees = self.config.gear(action.actuator).motor_degrees(action.degrees);
        hardware.play_tones(action.tones)?;
        hardware.rotate(action.actuator, self.config.speed_percent, degrees)?;
        hardware.stop_all()?;
        Ok(degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::recording::{Call, RecordingHardware};
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Log sink shared between a test and its subscriber
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::new(DispatchTable::standard(), DispatchConfig::default())
    }

    fn tones(pairs: &[(&str, &str)]) -> Vec<Tone> {
        pairs
            .iter()
            .map(|(pitch, value)| Tone::parse(pitch, value).unwrap())
            .collect()
    }

    #[test]
    fn test_alarm_active() {
        let mut hw = RecordingHardware::new();
        dispatcher()
            .dispatch(&mut hw, &[StateEntry::new("alarms", "active")])
            .unwrap();

        assert_eq!(
            hw.calls(),
            vec![
                Call::PlayTones(tones(&[("B3", "e"), ("D5", "e")])),
                Call::Rotate(Actuator::Secondary, 50, 105.0),
                Call::Stop(Actuator::Primary),
                Call::Stop(Actuator::Secondary),
            ]
        );
    }

    #[test]
    fn test_wakeword_cleared() {
        let mut hw = RecordingHardware::new();
        let outcomes = dispatcher()
            .dispatch(&mut hw, &[StateEntry::new("wakeword", "cleared")])
            .unwrap();

        assert_eq!(
            hw.calls(),
            vec![
                Call::PlayTones(tones(&[("C5", "e"), ("A3", "e")])),
                Call::Rotate(Actuator::Primary, 50, 180.0),
                Call::Stop(Actuator::Primary),
                Call::Stop(Actuator::Secondary),
            ]
        );
        assert!(matches!(
            &outcomes[..],
            [DispatchOutcome::Performed { actuator: Actuator::Primary, degrees, .. }] if *degrees == 180.0
        ));
    }

    #[test]
    fn test_full_table_rotations() {
        let cases = [
            ("wakeword", "active", Actuator::Primary, 180.0),
            ("wakeword", "cleared", Actuator::Primary, 180.0),
            ("alarms", "active", Actuator::Secondary, 105.0),
            ("alarms", "cleared", Actuator::Secondary, 315.0),
            ("timers", "active", Actuator::Secondary, 210.0),
            ("timers", "cleared", Actuator::Secondary, 210.0),
            ("reminders", "active", Actuator::Secondary, 315.0),
            ("reminders", "cleared", Actuator::Secondary, 105.0),
        ];

        for (category, value, actuator, degrees) in cases {
            let mut hw = RecordingHardware::new();
            dispatcher()
                .dispatch(&mut hw, &[StateEntry::new(category, value)])
                .unwrap();
            assert_eq!(hw.rotations(), vec![(actuator, degrees)], "{category}/{value}");

            let calls = hw.calls();
            assert_eq!(
                &calls[calls.len() - 2..],
                &[Call::Stop(Actuator::Primary), Call::Stop(Actuator::Secondary)],
                "{category}/{value} must leave both motors stopped"
            );
        }
    }

    #[test]
    fn test_unmatched_has_no_side_effect() {
        let mut hw = RecordingHardware::new();
        let outcomes = dispatcher()
            .dispatch(
                &mut hw,
                &[
                    StateEntry::new("alarms", "Active"),
                    StateEntry::new("notifications", "active"),
                ],
            )
            .unwrap();

        assert!(hw.calls().is_empty());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, DispatchOutcome::Ignored { .. })));
    }

    #[test]
    fn test_timeinfo_only_logs() {
        let mut hw = RecordingHardware::new();
        let outcomes = dispatcher()
            .dispatch(&mut hw, &[StateEntry::new("timeinfo", "2019-11-01T12:00:00")])
            .unwrap();

        assert!(hw.calls().is_empty());
        assert_eq!(
            outcomes,
            vec![DispatchOutcome::TimeInfo {
                value: "2019-11-01T12:00:00".to_string()
            }]
        );
    }

    #[test]
    fn test_timeinfo_value_is_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        let mut hw = RecordingHardware::new();
        tracing::subscriber::with_default(subscriber, || {
            dispatcher()
                .dispatch(&mut hw, &[StateEntry::new("timeinfo", "2019-11-01T12:00:00")])
                .unwrap();
        });

        let output = logs.contents();
        assert!(output.contains("time info"), "{output}");
        assert!(output.contains("value=2019-11-01T12:00:00"), "{output}");
        assert!(hw.calls().is_empty());
    }

    #[test]
    fn test_batch_in_order() {
        let mut hw = RecordingHardware::new();
        dispatcher()
            .dispatch(
                &mut hw,
                &[
                    StateEntry::new("timers", "active"),
                    StateEntry::new("timeinfo", "noon"),
                    StateEntry::new("wakeword", "active"),
                ],
            )
            .unwrap();

        assert_eq!(
            hw.rotations(),
            vec![(Actuator::Secondary, 210.0), (Actuator::Primary, 180.0)]
        );
    }

    #[test]
    fn test_hardware_error_stops_batch() {
        let mut hw = RecordingHardware::failing_rotate();
        let result = dispatcher().dispatch(
            &mut hw,
            &[
                StateEntry::new("alarms", "active"),
                StateEntry::new("wakeword", "active"),
            ],
        );

        assert!(matches!(result, Err(HardwareError::MotorTimeout { .. })));
        assert_eq!(hw.rotations(), vec![(Actuator::Secondary, 105.0)]);
    }

    #[test]
    fn test_custom_speed() {
        let config = DispatchConfig {
            speed_percent: 80,
            ..DispatchConfig::default()
        };
        let mut hw = RecordingHardware::new();
        EventDispatcher::new(DispatchTable::standard(), config)
            .dispatch(&mut hw, &[StateEntry::new("wakeword", "active")])
            .unwrap();
        assert!(hw
            .calls()
            .contains(&Call::Rotate(Actuator::Primary, 80, 180.0)));
    }

    #[test]
    fn test_state_entry_wire_name() {
        let entry: StateEntry =
            serde_json::from_str(r#"{"name":"wakeword","value":"active"}"#).unwrap();
        assert_eq!(entry, StateEntry::new("wakeword", "active"));
    }

    #[test]
    fn test_gear_ratio() {
        let gear = DispatchConfig::default().secondary_gear;
        assert_eq!(gear.motor_degrees(90.0), 105.0);
        assert_eq!(gear.motor_degrees(360.0), 420.0);
        assert_eq!(GearRatio::DIRECT.motor_degrees(180.0), 180.0);
    }
}
