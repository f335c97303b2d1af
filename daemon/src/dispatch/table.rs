//! The fixed table of reactions

use crate::hardware::Actuator;
use crate::sound::{Letter, NoteValue, Pitch, Tone};

use Actuator::{Primary, Secondary};
use Letter::{A, B, C, D, E, F};

/// Category whose value is logged instead of acted on
pub const TIMEINFO: &str = "timeinfo";

/// What the gadget does for one `(category, value)` pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSpec {
    /// Audio cue played before moving
    pub tones: &'static [Tone],
    /// Flag to wave
    pub actuator: Actuator,
    /// Rotation of the flag itself, before any gearing
    pub degrees: f64,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    category: &'static str,
    value: &'static str,
    action: ActionSpec,
}

const fn eighth(letter: Letter, octave: i8) -> Tone {
    Tone::new(Pitch::natural(letter, octave), NoteValue::Eighth)
}

const fn entry(
    category: &'static str,
    value: &'static str,
    tones: &'static [Tone],
    actuator: Actuator,
    degrees: f64,
) -> Entry {
    Entry {
        category,
        value,
        action: ActionSpec {
            tones,
            actuator,
            degrees,
        },
    }
}

const STANDARD: &[Entry] = &[
    entry("wakeword", "active", &[eighth(A, 3), eighth(C, 5)], Primary, 180.0),
    entry("wakeword", "cleared", &[eighth(C, 5), eighth(A, 3)], Primary, 180.0),
    entry("alarms", "active", &[eighth(B, 3), eighth(D, 5)], Secondary, 90.0),
    entry("alarms", "cleared", &[eighth(B, 5), eighth(D, 3)], Secondary, 270.0),
    entry("timers", "active", &[eighth(C, 3), eighth(E, 5)], Secondary, 180.0),
    entry("timers", "cleared", &[eighth(E, 5), eighth(C, 3)], Secondary, 180.0),
    entry("reminders", "active", &[eighth(D, 3), eighth(F, 5)], Secondary, 270.0),
    entry("reminders", "cleared", &[eighth(F, 5), eighth(D, 3)], Secondary, 90.0),
];

/// Immutable mapping from `(category, value)` to an [`ActionSpec`]
#[derive(Debug, Clone, Copy)]
pub struct DispatchTable {
    entries: &'static [Entry],
}

impl DispatchTable {
    /// The flag gadget's reactions to wake word, alarm, timer and
    /// reminder state changes
    pub fn standard() -> Self {
        Self { entries: STANDARD }
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, category: &str, value: &str) -> Option<&'static ActionSpec> {
        self.entries
            .iter()
            .find(|e| e.category == category && e.value == value)
            .map(|e| &e.action)
    }

    /// Every category the gadget reacts to, including `timeinfo`, sorted
    pub fn categories(&self) -> Vec<&'static str> {
        let mut categories: Vec<&'static str> = self
            .entries
            .iter()
            .map(|e| e.category)
            .chain(std::iter::once(TIMEINFO))
            .collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}
