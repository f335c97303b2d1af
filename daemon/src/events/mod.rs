//! Events emitted by the gadget controller
//!
//! Published on a broadcast channel so the directive server can keep its
//! status snapshot current without touching the hardware.

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOutcome;
use crate::hardware::Actuator;

/// Things the gadget did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GadgetEvent {
    /// Startup sequence finished
    PoweredOn,

    /// Paired companion device connected
    Connected { device_addr: String },

    /// Paired companion device went away
    Disconnected { device_addr: String },

    /// A state entry triggered a flag wave
    ActionPerformed {
        category: String,
        value: String,
        actuator: Actuator,
        degrees: f64,
    },

    /// Companion reported the time
    TimeInfo { value: String },

    /// Shutdown sequence finished
    PoweredOff,
}

impl GadgetEvent {
    /// Event for a dispatch outcome, if it is worth publishing
    pub fn from_outcome(outcome: &DispatchOutcome) -> Option<Self> {
        match outcome {
            DispatchOutcome::Performed {
                category,
                value,
                actuator,
                degrees,
                ..
            } => Some(GadgetEvent::ActionPerformed {
                category: category.clone(),
                value: value.clone(),
                actuator: *actuator,
                degrees: *degrees,
            }),
            DispatchOutcome::TimeInfo { value } => Some(GadgetEvent::TimeInfo {
                value: value.clone(),
            }),
            DispatchOutcome::Ignored { .. } => None,
        }
    }
}

impl std::fmt::Display for GadgetEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GadgetEvent::PoweredOn => write!(f, "POWERED_ON"),
            GadgetEvent::Connected { device_addr } => write!(f, "CONNECTED ({device_addr})"),
            GadgetEvent::Disconnected { device_addr } => {
                write!(f, "DISCONNECTED ({device_addr})")
            }
            GadgetEvent::ActionPerformed {
                category, value, ..
            } => write!(f, "ACTION_PERFORMED ({category}={value})"),
            GadgetEvent::TimeInfo { value } => write!(f, "TIME_INFO ({value})"),
            GadgetEvent::PoweredOff => write!(f, "POWERED_OFF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = GadgetEvent::Connected {
            device_addr: "AA:BB:CC:DD:EE:FF".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"time_info","value":"12:00"}"#;
        let event: GadgetEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            GadgetEvent::TimeInfo {
                value: "12:00".to_string()
            }
        );
    }

    #[test]
    fn test_ignored_outcome_has_no_event() {
        let outcome = DispatchOutcome::Ignored {
            category: "x".to_string(),
            value: "y".to_string(),
        };
        assert!(GadgetEvent::from_outcome(&outcome).is_none());
    }

    #[test]
    fn test_display() {
        let event = GadgetEvent::ActionPerformed {
            category: "alarms".to_string(),
            value: "active".to_string(),
            actuator: Actuator::Secondary,
            degrees: 105.0,
        };
        assert_eq!(event.to_string(), "ACTION_PERFORMED (alarms=active)");
    }
}
