//! Event dispatch: maps companion state entries to hardware actions
//!
//! Each `(category, value)` pair the companion reports is looked up in a
//! fixed [`DispatchTable`]. A match plays a short tone sequence and waves
//! one flag, after which both motors are stopped. `timeinfo` entries are
//! only logged.

mod dispatcher;
mod table;

pub use dispatcher::{DispatchConfig, DispatchOutcome, EventDispatcher, GearRatio, StateEntry};
pub use table::{ActionSpec, DispatchTable, TIMEINFO};
