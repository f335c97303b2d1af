//! Gadget controller: connection lifecycle, startup and shutdown sequences

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::dispatch::{DispatchOutcome, EventDispatcher, StateEntry};
use crate::events::GadgetEvent;
use crate::hardware::{Actuator, Hardware, HardwareError, LedColor};
use crate::sound::{BaseValue, Letter, NoteValue, Pitch, Tone};

const fn tone(letter: Letter, octave: i8, value: NoteValue) -> Tone {
    Tone::new(Pitch::natural(letter, octave), value)
}

const TRIPLET: NoteValue = NoteValue::Triplet(BaseValue::Eighth);

const CONNECT_TONES: [Tone; 3] = [
    tone(Letter::C, 4, NoteValue::Eighth),
    tone(Letter::D, 4, NoteValue::Eighth),
    tone(Letter::E, 5, NoteValue::Quarter),
];

const DISCONNECT_TONES: [Tone; 3] = [
    tone(Letter::E, 5, NoteValue::Eighth),
    tone(Letter::D, 4, NoteValue::Eighth),
    tone(Letter::C, 4, NoteValue::Quarter),
];

const POWER_ON_TONES: [Tone; 2] = [tone(Letter::C, 4, TRIPLET), tone(Letter::E, 5, TRIPLET)];

const POWER_OFF_TONES: [Tone; 2] = [tone(Letter::E, 5, TRIPLET), tone(Letter::C, 4, TRIPLET)];

/// Flag rotation for the greeting wave on connect
const GREETING_DEGREES: f64 = 360.0;

/// Whether a companion device is currently paired and connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Callbacks the companion-device bridge invokes on the gadget
pub trait GadgetHandler {
    /// Companion device connected
    fn on_connect(&mut self, device_addr: &str) -> Result<(), HardwareError>;

    /// Companion device disconnected
    fn on_disconnect(&mut self, device_addr: &str) -> Result<(), HardwareError>;

    /// Companion reported one or more state changes
    fn on_state_update(
        &mut self,
        entries: &[StateEntry],
    ) -> Result<Vec<DispatchOutcome>, HardwareError>;
}

/// Owns the hardware and reacts to the companion device
pub struct Controller<H> {
    hardware: H,
    dispatcher: EventDispatcher,
    state: ConnectionState,
    event_tx: broadcast::Sender<GadgetEvent>,
}

impl<H: Hardware> Controller<H> {
    pub fn new(
        hardware: H,
        dispatcher: EventDispatcher,
        event_tx: broadcast::Sender<GadgetEvent>,
    ) -> Self {
        Self {
            hardware,
            dispatcher,
            state: ConnectionState::Disconnected,
            event_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Startup sequence: LEDs off, jingle, LEDs green
    pub fn power_on(&mut self) -> Result<(), HardwareError> {
        self.hardware.set_leds(LedColor::Black)?;
        self.hardware.play_tones(&POWER_ON_TONES)?;
        self.hardware.set_leds(LedColor::Green)?;
        info!("gadget powered on");
        self.emit(GadgetEvent::PoweredOn);
        Ok(())
    }

    /// Shutdown sequence: reverse jingle, LEDs off
    pub fn power_off(&mut self) -> Result<(), HardwareError> {
        self.hardware.play_tones(&POWER_OFF_TONES)?;
        self.hardware.set_leds(LedColor::Black)?;
        info!("gadget powered off");
        self.emit(GadgetEvent::PoweredOff);
        Ok(())
    }

    fn transition_to(&mut self, new_state: ConnectionState, device_addr: &str) {
        info!(
            from = %self.state,
            to = %new_state,
            device_addr,
            "connection state transition"
        );
        self.state = new_state;
    }

    fn emit(&self, event: GadgetEvent) {
        debug!(%event, "emitting gadget event");
        let _ = self.event_tx.send(event);
    }
}

impl<H: Hardware> GadgetHandler for Controller<H> {
    fn on_connect(&mut self, device_addr: &str) -> Result<(), HardwareError> {
        self.hardware.set_leds(LedColor::Green)?;
        self.hardware.play_tones(&CONNECT_TONES)?;

        let config = *self.dispatcher.config();
        for actuator in [Actuator::Secondary, Actuator::Primary] {
            let degrees = config.gear(actuator).motor_degrees(GREETING_DEGREES);
            self.hardware
                .rotate(actuator, config.speed_percent, degrees)?;
        }
        self.hardware.stop_all()?;

        self.transition_to(ConnectionState::Connected, device_addr);
        self.emit(GadgetEvent::Connected {
            device_addr: device_addr.to_string(),
        });
        Ok(())
    }

    fn on_disconnect(&mut self, device_addr: &str) -> Result<(), HardwareError> {
        self.hardware.set_leds(LedColor::Black)?;
        self.hardware.play_tones(&DISCONNECT_TONES)?;

        self.transition_to(ConnectionState::Disconnected, device_addr);
        self.emit(GadgetEvent::Disconnected {
            device_addr: device_addr.to_string(),
        });
        Ok(())
    }

    fn on_state_update(
        &mut self,
        entries: &[StateEntry],
    ) -> Result<Vec<DispatchOutcome>, HardwareError> {
        let outcomes = self.dispatcher.dispatch(&mut self.hardware, entries)?;
        for event in outcomes.iter().filter_map(GadgetEvent::from_outcome) {
            self.emit(event);
        }
        Ok(outcomes)
    }
}
