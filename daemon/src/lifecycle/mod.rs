//! Process lifecycle: signal handling for graceful shutdown

mod shutdown;

pub use shutdown::ShutdownSignal;
