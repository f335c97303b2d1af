//! Pitch and note value parsing, frequencies and durations

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised when a note or note value cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToneParseError {
    #[error("invalid note name: {0:?}")]
    InvalidPitch(String),

    #[error("invalid note value: {0:?}")]
    InvalidValue(String),
}

/// Note letter within an octave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    /// Semitones above C
    fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

/// A note name with octave, e.g. `A3` or `C#5`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    pub letter: Letter,
    pub accidental: Accidental,
    pub octave: i8,
}

impl Pitch {
    /// A natural (no sharp or flat) pitch
    pub const fn natural(letter: Letter, octave: i8) -> Self {
        Self {
            letter,
            accidental: Accidental::Natural,
            octave,
        }
    }

    /// Frequency in Hz, equal temperament with A4 = 440 Hz
    pub fn frequency(&self) -> f64 {
        let shift = match self.accidental {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        };
        let key = (i32::from(self.octave) + 1) * 12 + self.letter.semitone() + shift;
        440.0 * 2f64.powf(f64::from(key - 69) / 12.0)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}{}", self.letter.as_char(), accidental, self.octave)
    }
}

impl FromStr for Pitch {
    type Err = ToneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ToneParseError::InvalidPitch(s.to_string());
        let mut chars = s.chars();

        let letter = chars
            .next()
            .and_then(|c| Letter::from_char(c.to_ascii_uppercase()))
            .ok_or_else(invalid)?;

        let rest = chars.as_str();
        let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
            (Accidental::Sharp, octave)
        } else if let Some(octave) = rest.strip_prefix('b') {
            (Accidental::Flat, octave)
        } else {
            (Accidental::Natural, rest)
        };

        let octave: i8 = octave.parse().map_err(|_| invalid())?;
        if !(0..=9).contains(&octave) {
            return Err(invalid());
        }

        Ok(Self {
            letter,
            accidental,
            octave,
        })
    }
}

/// Beats per minute used to turn note values into durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo(pub u32);

impl Tempo {
    /// Length of one quarter note
    pub fn beat(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.0.max(1)))
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120)
    }
}

/// Relative length of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    /// One and a half times the inner value (`q.`)
    Dotted(BaseValue),
    /// Two thirds of the inner value (`e3`)
    Triplet(BaseValue),
}

/// Undecorated note value, used inside dotted and triplet values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl BaseValue {
    fn beats(self) -> f64 {
        match self {
            BaseValue::Whole => 4.0,
            BaseValue::Half => 2.0,
            BaseValue::Quarter => 1.0,
            BaseValue::Eighth => 0.5,
            BaseValue::Sixteenth => 0.25,
        }
    }

    fn symbol(self) -> char {
        match self {
            BaseValue::Whole => 'w',
            BaseValue::Half => 'h',
            BaseValue::Quarter => 'q',
            BaseValue::Eighth => 'e',
            BaseValue::Sixteenth => 's',
        }
    }

    fn from_symbol(c: char) -> Option<Self> {
        match c {
            'w' => Some(BaseValue::Whole),
            'h' => Some(BaseValue::Half),
            'q' => Some(BaseValue::Quarter),
            'e' => Some(BaseValue::Eighth),
            's' => Some(BaseValue::Sixteenth),
            _ => None,
        }
    }
}

impl NoteValue {
    fn base(self) -> BaseValue {
        match self {
            NoteValue::Whole => BaseValue::Whole,
            NoteValue::Half => BaseValue::Half,
            NoteValue::Quarter => BaseValue::Quarter,
            NoteValue::Eighth => BaseValue::Eighth,
            NoteValue::Sixteenth => BaseValue::Sixteenth,
            NoteValue::Dotted(base) | NoteValue::Triplet(base) => base,
        }
    }

    /// Length in beats (quarter notes)
    pub fn beats(self) -> f64 {
        let base = self.base().beats();
        match self {
            NoteValue::Dotted(_) => base * 1.5,
            NoteValue::Triplet(_) => base * 2.0 / 3.0,
            _ => base,
        }
    }

    /// Duration of this value at the given tempo
    pub fn duration(self, tempo: Tempo) -> Duration {
        tempo.beat().mul_f64(self.beats())
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.base().symbol();
        match self {
            NoteValue::Dotted(_) => write!(f, "{symbol}."),
            NoteValue::Triplet(_) => write!(f, "{symbol}3"),
            _ => write!(f, "{symbol}"),
        }
    }
}

impl FromStr for NoteValue {
    type Err = ToneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ToneParseError::InvalidValue(s.to_string());
        let mut chars = s.chars();
        let base = chars
            .next()
            .and_then(BaseValue::from_symbol)
            .ok_or_else(invalid)?;

        match chars.as_str() {
            "" => Ok(match base {
                BaseValue::Whole => NoteValue::Whole,
                BaseValue::Half => NoteValue::Half,
                BaseValue::Quarter => NoteValue::Quarter,
                BaseValue::Eighth => NoteValue::Eighth,
                BaseValue::Sixteenth => NoteValue::Sixteenth,
            }),
            "." => Ok(NoteValue::Dotted(base)),
            "3" => Ok(NoteValue::Triplet(base)),
            _ => Err(invalid()),
        }
    }
}

/// One note of an audio cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(String, String)", into = "(String, String)")]
pub struct Tone {
    pub pitch: Pitch,
    pub value: NoteValue,
}

impl Tone {
    pub const fn new(pitch: Pitch, value: NoteValue) -> Self {
        Self { pitch, value }
    }

    /// Parse a `("A3", "e")` pair
    pub fn parse(pitch: &str, value: &str) -> Result<Self, ToneParseError> {
        Ok(Self {
            pitch: pitch.parse()?,
            value: value.parse()?,
        })
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pitch, self.value)
    }
}

impl TryFrom<(String, String)> for Tone {
    type Error = ToneParseError;

    fn try_from((pitch, value): (String, String)) -> Result<Self, Self::Error> {
        Tone::parse(&pitch, &value)
    }
}

impl From<Tone> for (String, String) {
    fn from(tone: Tone) -> Self {
        (tone.pitch.to_string(), tone.value.to_string())
    }
}
