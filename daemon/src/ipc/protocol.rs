//! Directive socket message protocol
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchOutcome, StateEntry};
use crate::gadget::ConnectionState;

/// Largest frame accepted from a client
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// State listener payload as delivered by the companion device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub states: Vec<StateEntry>,
}

/// Requests from the bridge to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Companion device connected
    Connected { device_addr: String },

    /// Companion device disconnected
    Disconnected { device_addr: String },

    /// Companion state changes
    StateUpdate { payload: StatePayload },

    /// Request current gadget status
    GetStatus,

    /// Ping to check connectivity
    Ping,
}

/// Responses from daemon to bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Directive carried out
    Ack {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        outcomes: Vec<DispatchOutcome>,
    },

    /// Current gadget status
    Status(GadgetStatus),

    /// Pong response to ping
    Pong,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.as_str().to_string(),
            message: message.into(),
        }
    }
}

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The hardware failed while carrying out the directive
    HardwareFault,
    /// The worker has stopped and accepts no more directives
    WorkerUnavailable,
    /// The frame was not a valid request
    InvalidRequest,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::HardwareFault => "hardware_fault",
            ErrorCode::WorkerUnavailable => "worker_unavailable",
            ErrorCode::InvalidRequest => "invalid_request",
        }
    }
}

/// Full gadget status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GadgetStatus {
    /// Daemon version
    pub version: String,

    pub connection: ConnectionState,

    /// Address of the last companion device seen
    pub device_addr: Option<String>,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Flag waves since startup
    pub actions_performed: u64,

    /// State categories the gadget reacts to
    pub capabilities: Vec<String>,
}

impl Default for GadgetStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            connection: ConnectionState::default(),
            device_addr: None,
            uptime_secs: 0,
            actions_performed: 0,
            capabilities: Vec::new(),
        }
    }
}
