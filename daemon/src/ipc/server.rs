//! Unix domain socket server for the companion bridge
//!
//! Receives lifecycle and state directives, forwards them to the gadget
//! worker and answers status queries from its own snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::GadgetEvent;
use crate::gadget::{ConnectionState, Directive, WorkerClient, WorkerError};

use super::protocol::{ErrorCode, GadgetStatus, Request, Response, MAX_FRAME_LEN};

/// Directive server handling bridge connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<RwLock<ServerState>>,
    worker: WorkerClient,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    status: GadgetStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Bind the socket and prepare to serve
    pub fn new(socket_path: &Path, worker: WorkerClient, capabilities: Vec<String>) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: GadgetStatus {
                capabilities,
                ..GadgetStatus::default()
            },
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "directive server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state,
            worker,
            shutdown_tx,
        })
    }

    /// Fold a gadget event into the status snapshot
    pub async fn record_event(&self, event: &GadgetEvent) {
        let mut state = self.state.write().await;
        let status = &mut state.status;
        match event {
            GadgetEvent::Connected { device_addr } => {
                status.connection = ConnectionState::Connected;
                status.device_addr = Some(device_addr.clone());
            }
            GadgetEvent::Disconnected { device_addr } => {
                status.connection = ConnectionState::Disconnected;
                status.device_addr = Some(device_addr.clone());
            }
            GadgetEvent::ActionPerformed { .. } => {
                status.actions_performed += 1;
            }
            GadgetEvent::PoweredOn | GadgetEvent::PoweredOff | GadgetEvent::TimeInfo { .. } => {}
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("bridge connected");
                    let state = Arc::clone(&self.state);
                    let worker = self.worker.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, worker) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        worker: WorkerClient,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("bridge disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_FRAME_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            let request: Request = match serde_json::from_slice(&msg_buf) {
                Ok(request) => request,
                Err(e) => {
                    warn!(%e, "invalid request");
                    let response = Response::error(ErrorCode::InvalidRequest, e.to_string());
                    Self::send_message(&mut stream, &response).await?;
                    continue;
                }
            };

            debug!(?request, "received request");

            let response = Self::process_request(request, &state, &worker).await;
            Self::send_message(&mut stream, &response).await?;
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = u32::try_from(msg_bytes.len())
            .context("response too large")?
            .to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
        worker: &WorkerClient,
    ) -> Response {
        let directive = match request {
            Request::Ping => return Response::Pong,

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                return Response::Status(state.status.clone());
            }

            Request::Connected { device_addr } => Directive::Connected { device_addr },
            Request::Disconnected { device_addr } => Directive::Disconnected { device_addr },
            Request::StateUpdate { payload } => Directive::StateUpdate(payload.states),
        };

        match worker.submit(directive).await {
            Ok(outcomes) => Response::Ack { outcomes },
            Err(WorkerError::Fault(message)) => Response::error(ErrorCode::HardwareFault, message),
            Err(e) => Response::error(ErrorCode::WorkerUnavailable, e.to_string()),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("directive server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchConfig, DispatchOutcome, DispatchTable, EventDispatcher};
    use crate::gadget::{Controller, GadgetWorker, WorkerDone};
    use crate::hardware::recording::RecordingHardware;
    use crate::hardware::Actuator;

    fn start_worker(hw: RecordingHardware) -> (WorkerClient, WorkerDone) {
        let (tx, _) = broadcast::channel(16);
        let dispatcher = EventDispatcher::new(DispatchTable::standard(), DispatchConfig::default());
        GadgetWorker::spawn(Controller::new(hw, dispatcher, tx), 8).unwrap()
    }

    async fn roundtrip(stream: &mut UnixStream, request: &str) -> Response {
        stream
            .write_all(&(request.len() as u32).to_le_bytes())
            .await
            .unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut buf).await.unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[tokio::test]
    async fn test_serves_directives() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("gadget.sock");
        let hw = RecordingHardware::new();
        let (worker, _done) = start_worker(hw.clone());

        let server = Arc::new(
            Server::new(&socket_path, worker, vec!["alarms".to_string()]).unwrap(),
        );
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        assert_eq!(roundtrip(&mut stream, r#"{"type":"ping"}"#).await, Response::Pong);

        let response = roundtrip(
            &mut stream,
            r#"{"type":"state_update","payload":{"states":[{"name":"alarms","value":"active"},{"name":"foo","value":"bar"}]}}"#,
        )
        .await;
        let Response::Ack { outcomes } = response else {
            panic!("expected ack, got {response:?}");
        };
        assert!(matches!(
            &outcomes[..],
            [DispatchOutcome::Performed { .. }, DispatchOutcome::Ignored { .. }]
        ));
        assert_eq!(hw.rotations(), vec![(Actuator::Secondary, 105.0)]);

        server
            .record_event(&GadgetEvent::Connected {
                device_addr: "AA:BB".to_string(),
            })
            .await;
        let Response::Status(status) = roundtrip(&mut stream, r#"{"type":"get_status"}"#).await
        else {
            panic!("expected status");
        };
        assert_eq!(status.connection, ConnectionState::Connected);
        assert_eq!(status.device_addr.as_deref(), Some("AA:BB"));
        assert_eq!(status.capabilities, vec!["alarms".to_string()]);

        server.shutdown().await;
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_reports_hardware_fault() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("gadget.sock");
        let (worker, done) = start_worker(RecordingHardware::failing_rotate());

        let server = Arc::new(Server::new(&socket_path, worker, Vec::new()).unwrap());
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let response = roundtrip(
            &mut stream,
            r#"{"type":"connected","device_addr":"AA:BB"}"#,
        )
        .await;
        assert!(matches!(response, Response::Error { ref code, .. } if code == "hardware_fault"));
        assert!(done.await.unwrap().is_err());

        let response = roundtrip(
            &mut stream,
            r#"{"type":"disconnected","device_addr":"AA:BB"}"#,
        )
        .await;
        assert!(
            matches!(response, Response::Error { ref code, .. } if code == "worker_unavailable")
        );
    }

    #[tokio::test]
    async fn test_invalid_request_keeps_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let socket_path = tmp.path().join("gadget.sock");
        let hw = RecordingHardware::new();
        let (worker, _done) = start_worker(hw.clone());

        let server = Arc::new(Server::new(&socket_path, worker, Vec::new()).unwrap());
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        for garbage in ["not json", r#"{"type":"reboot"}"#, r#"{"type":"connected"}"#] {
            let response = roundtrip(&mut stream, garbage).await;
            assert!(
                matches!(response, Response::Error { ref code, .. } if code == "invalid_request"),
                "{garbage}: {response:?}"
            );
        }

        assert_eq!(roundtrip(&mut stream, r#"{"type":"ping"}"#).await, Response::Pong);
        assert!(hw.rotations().is_empty());

        server.shutdown().await;
    }
}
