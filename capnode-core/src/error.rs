use crate::handle::Handle;
use serde::{Deserialize, Serialize};

/// Outgoing stack traces are capped so a pathological error cannot balloon a
/// wire frame.
const STACK_CAP: usize = 8 * 1024;

/// The error value carried by a wire `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default)]
    pub stack: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorPayload {
            message: message.into(),
            stack: String::new(),
        }
    }

    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        let mut stack = stack.into();
        if stack.len() > STACK_CAP {
            stack.truncate(STACK_CAP);
        }
        ErrorPayload {
            message: message.into(),
            stack,
        }
    }
}

/// Error taxonomy of the runtime.
///
/// `Protocol` and `TransportClosed` surface locally and are never echoed to
/// the peer; `UnknownMethod` and `Method` cross the wire as `error` messages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown method handle {0}")]
    UnknownMethod(Handle),

    #[error("method failed: {message}")]
    Method { message: String, stack: String },

    #[error("value is not callable")]
    NotCallable,

    #[error("transport closed: {0}")]
    TransportClosed(String),
}

impl RpcError {
    pub fn protocol(message: impl Into<String>) -> Self {
        RpcError::Protocol(message.into())
    }

    pub fn method(message: impl Into<String>) -> Self {
        RpcError::Method {
            message: message.into(),
            stack: String::new(),
        }
    }

    pub fn transport_closed(message: impl Into<String>) -> Self {
        RpcError::TransportClosed(message.into())
    }

    /// Wire form of this error, for forwarding a failure to the peer.
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            RpcError::Method { message, stack } => ErrorPayload::with_stack(message, stack.clone()),
            other => ErrorPayload::new(other.to_string()),
        }
    }

    /// Rebuild the local error a settled `error` message stands for.
    pub fn from_payload(payload: ErrorPayload) -> Self {
        RpcError::Method {
            message: payload.message,
            stack: payload.stack,
        }
    }
}
