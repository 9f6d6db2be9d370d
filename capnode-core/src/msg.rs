use crate::error::ErrorPayload;
use crate::handle::Handle;
use crate::shape::Shape;
use serde::{Deserialize, Serialize};

/// A wire message.
///
/// `init` delivers the sender's exported shape once per session.
/// `invocation` carries a call to an exported function; its `replyId` comes
/// back as the `methodId` of the matching `return` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Init {
        value: Shape,
    },
    Invocation {
        #[serde(rename = "methodId")]
        method_id: Handle,
        arguments: Vec<Shape>,
        #[serde(rename = "replyId")]
        reply_id: Handle,
    },
    Return {
        #[serde(rename = "methodId")]
        method_id: Handle,
        value: Shape,
    },
    Error {
        #[serde(rename = "methodId")]
        method_id: Handle,
        value: ErrorPayload,
    },
}

impl Message {
    /// Wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Init { .. } => "init",
            Message::Invocation { .. } => "invocation",
            Message::Return { .. } => "return",
            Message::Error { .. } => "error",
        }
    }
}
