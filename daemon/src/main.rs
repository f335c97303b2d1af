//! flag-gadget-daemon: voice-assistant companion gadget for an ev3dev brick
//!
//! This daemon runs on the brick and provides:
//! - A fixed dispatch table from companion state changes to flag waves
//! - Connection greeting/farewell and startup/shutdown sequences
//! - A Unix socket through which the pairing bridge delivers directives
//!
//! Pairing and transport with the companion device belong to the bridge;
//! the daemon only reacts to what the bridge forwards.

mod config;
mod dispatch;
mod events;
mod gadget;
mod hardware;
mod ipc;
mod lifecycle;
mod sound;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Backend, Config};
use crate::dispatch::{DispatchTable, EventDispatcher};
use crate::events::GadgetEvent;
use crate::gadget::{Controller, GadgetWorker};
use crate::hardware::{DryRunHardware, Ev3devHardware, Hardware};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;

/// Directives that may queue up behind a moving flag
const WORKER_QUEUE: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "flag-gadget-daemon starting"
    );

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        ?config.backend,
        speed = config.dispatch.speed_percent,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::register().context("failed to register signal handlers")?;

    // Controller -> status tracking and logs
    let (event_tx, mut event_rx) = broadcast::channel::<GadgetEvent>(64);

    let table = DispatchTable::standard();
    let capabilities = table.categories().into_iter().map(String::from).collect();
    let dispatcher = EventDispatcher::new(table, config.dispatch);
    let controller = Controller::new(open_hardware(&config)?, dispatcher, event_tx.clone());

    // Startup sequence runs on the worker thread before it takes directives
    let (worker, mut worker_done) = GadgetWorker::spawn(controller, WORKER_QUEUE)?;

    let server = Server::new(&config.socket_path, worker.clone(), capabilities)?;

    info!("daemon initialized, entering main loop");

    let fault = tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "directive server error");
            }
            None
        }

        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "gadget event");
                        server.record_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "gadget event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("gadget event handler exited");
            None
        }

        result = &mut worker_done => Some(result),

        _ = shutdown.wait() => {
            info!("shutdown signal received");
            None
        }
    };

    info!("shutting down...");
    server.shutdown().await;

    let outcome = match fault {
        Some(outcome) => outcome,
        None => {
            worker.power_off().await;
            worker_done.await
        }
    };

    match outcome {
        Ok(Ok(())) => {
            info!("flag-gadget-daemon stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("gadget hardware fault"),
        Err(_) => bail!("gadget worker exited without reporting"),
    }
}

fn open_hardware(config: &Config) -> Result<Box<dyn Hardware + Send>> {
    let hardware: Box<dyn Hardware + Send> = match config.backend {
        Backend::Ev3dev => Box::new(
            Ev3devHardware::open(
                config.sysfs_root.clone(),
                config.beep_command.clone(),
                config.tempo,
            )
            .context("failed to open ev3dev hardware")?,
        ),
        Backend::DryRun => Box::new(DryRunHardware::new()),
    };
    Ok(hardware)
}
