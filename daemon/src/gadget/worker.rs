//! Dedicated thread that owns the controller
//!
//! Hardware calls block, sometimes for seconds while a flag turns, so the
//! controller lives on its own OS thread and receives directives one at a
//! time. The async side only ever holds a [`WorkerClient`].

use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::dispatch::{DispatchOutcome, StateEntry};
use crate::hardware::{Hardware, HardwareError};

use super::controller::{Controller, GadgetHandler};

/// A lifecycle or state callback to run on the gadget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Connected { device_addr: String },
    Disconnected { device_addr: String },
    StateUpdate(Vec<StateEntry>),
}

type Reply = oneshot::Sender<Result<Vec<DispatchOutcome>, String>>;

enum Command {
    Apply { directive: Directive, reply: Reply },
    PowerOff,
}

/// Errors seen by users of the worker
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("gadget worker is not running")]
    Unavailable,

    #[error("hardware fault: {0}")]
    Fault(String),

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
}

/// Handle for submitting directives to the worker
#[derive(Debug, Clone)]
pub struct WorkerClient {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Apply { directive, .. } => f.debug_tuple("Apply").field(directive).finish(),
            Command::PowerOff => f.write_str("PowerOff"),
        }
    }
}

impl WorkerClient {
    /// Run a directive and wait until the hardware is done with it
    pub async fn submit(&self, directive: Directive) -> Result<Vec<DispatchOutcome>, WorkerError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Apply { directive, reply })
            .await
            .map_err(|_| WorkerError::Unavailable)?;

        reply_rx
            .await
            .map_err(|_| WorkerError::Unavailable)?
            .map_err(WorkerError::Fault)
    }

    /// Ask the worker to run the shutdown sequence and exit
    pub async fn power_off(&self) {
        if self.tx.send(Command::PowerOff).await.is_err() {
            warn!("gadget worker already stopped");
        }
    }
}

/// Completion of the worker thread: `Err` carries the fault that stopped it
pub type WorkerDone = oneshot::Receiver<Result<(), HardwareError>>;

/// Spawns the worker thread
pub struct GadgetWorker;

impl GadgetWorker {
    /// Start the worker; the startup sequence runs on the worker thread
    pub fn spawn<H>(
        controller: Controller<H>,
        capacity: usize,
    ) -> Result<(WorkerClient, WorkerDone), WorkerError>
    where
        H: Hardware + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = oneshot::channel();

        thread::Builder::new()
            .name("gadget-worker".to_string())
            .spawn(move || {
                info!("gadget worker thread started");
                let result = run(controller, rx);
                if let Err(e) = &result {
                    error!(%e, "gadget worker stopped on hardware fault");
                }
                let _ = done_tx.send(result);
                info!("gadget worker thread stopped");
            })
            .map_err(|e| WorkerError::ThreadSpawn(e.to_string()))?;

        Ok((WorkerClient { tx }, done_rx))
    }
}

fn run<H: Hardware>(
    mut controller: Controller<H>,
    mut rx: mpsc::Receiver<Command>,
) -> Result<(), HardwareError> {
    controller.power_on()?;

    while let Some(command) = rx.blocking_recv() {
        let (directive, reply) = match command {
            Command::PowerOff => break,
            Command::Apply { directive, reply } => (directive, reply),
        };

        match apply(&mut controller, directive) {
            Ok(outcomes) => {
                debug!(state = %controller.state(), "directive applied");
                let _ = reply.send(Ok(outcomes));
            }
            Err(e) => {
                let _ = reply.send(Err(e.to_string()));
                if let Err(off) = controller.power_off() {
                    warn!(%off, "shutdown sequence failed after fault");
                }
                return Err(e);
            }
        }
    }

    controller.power_off()
}

fn apply<H: Hardware>(
    controller: &mut Controller<H>,
    directive: Directive,
) -> Result<Vec<DispatchOutcome>, HardwareError> {
    match directive {
        Directive::Connected { device_addr } => {
            controller.on_connect(&device_addr).map(|()| Vec::new())
        }
        Directive::Disconnected { device_addr } => {
            controller.on_disconnect(&device_addr).map(|()| Vec::new())
        }
        Directive::StateUpdate(entries) => controller.on_state_update(&entries),
    }
}
