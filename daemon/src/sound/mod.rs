//! Tone definitions for the brick speaker
//!
//! Notes are written the way songs are written for the ev3dev `Sound`
//! helper: a pitch such as `A3` or `C#5` and a note value such as `e`
//! (eighth), `q` (quarter) or `e3` (eighth triplet).

mod tone;

pub use tone::{BaseValue, Letter, NoteValue, Pitch, Tempo, Tone};
