//! Reconstruction of wire shapes into local mirrors.
//!
//! Objects, arrays, and primitives mirror the serializer's walk. A function
//! shape becomes a [`RemoteProxy`]: a local callable bound to the peer's
//! handle, whose invocation ships an `invocation` message and suspends until
//! the matching reply settles.

use crate::error::RpcError;
use crate::export::serialize;
use crate::handle::Handle;
use crate::msg::Message;
use crate::node::NodeInner;
use crate::shape::Shape;
use crate::value::{ApiFunction, ApiValue};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Mirror `shape` locally. Function leaves become proxies bound to the peer
/// that emitted the shape.
pub(crate) fn deserialize(node: &Arc<NodeInner>, shape: &Shape) -> ApiValue {
    match shape {
        Shape::String { value } => ApiValue::String(value.clone()),
        Shape::Number { value } => ApiValue::Number(value.clone()),
        Shape::Array { value } => ApiValue::Array(
            value.iter().map(|item| deserialize(node, item)).collect(),
        ),
        Shape::Object { value } => ApiValue::Object(
            value
                .iter()
                .map(|(key, item)| (key.clone(), deserialize(node, item)))
                .collect(),
        ),
        Shape::Function { method_id } => ApiValue::Function(Arc::new(RemoteProxy {
            node: Arc::downgrade(node),
            method_id: method_id.clone(),
        })),
    }
}

/// Callable bound to a remote handle.
///
/// Holds its node weakly: adopted mirrors live inside application state, and
/// a strong reference here would keep the node alive through its own values.
struct RemoteProxy {
    node: Weak<NodeInner>,
    method_id: Handle,
}

#[async_trait]
impl ApiFunction for RemoteProxy {
    async fn call(&self, args: Vec<ApiValue>) -> Result<ApiValue, RpcError> {
        let node = self
            .node
            .upgrade()
            .ok_or_else(|| RpcError::transport_closed("capnode dropped"))?;

        // Serializing the arguments registers any callback functions the
        // caller is passing along.
        let arguments: Vec<Shape> = args
            .iter()
            .map(|arg| serialize(&node.methods, arg))
            .collect();
        let (reply_id, reply) = node.replies.insert_new();
        debug!(method_id = %self.method_id, %reply_id, "forwarding invocation to peer");

        node.send_message(Message::Invocation {
            method_id: self.method_id.clone(),
            arguments,
            reply_id,
        });

        match reply.await {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::transport_closed("reply abandoned")),
        }
    }
}
