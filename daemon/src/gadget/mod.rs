//! The gadget itself: controller plus the worker thread that owns it
//!
//! The controller implements [`GadgetHandler`], the capability interface
//! the companion-device bridge drives. It tracks the connection state
//! (Disconnected or Connected) and plays the fixed greeting and farewell.

mod controller;
mod worker;

pub use controller::{ConnectionState, Controller, GadgetHandler};
pub use worker::{Directive, GadgetWorker, WorkerClient, WorkerDone, WorkerError};
