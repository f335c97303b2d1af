//! Directive socket between the companion bridge and the daemon

mod protocol;
mod server;

pub use server::Server;
