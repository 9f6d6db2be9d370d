//! Object-mode duplex stream over a node, and the pipe topology.

use crate::error::RpcError;
use crate::msg::Message;
use crate::node::{Capnode, NodeInner};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::warn;

/// Object-mode duplex view of a [`Capnode`].
///
/// The `Stream` side yields the node's outbound messages, draining the FIFO
/// queue as the consumer polls: a slow consumer leaves messages queued,
/// nothing is dropped or reordered. The `Sink` side feeds inbound messages
/// to the dispatcher; a rejected message (protocol anomaly) surfaces as the
/// sink error and leaves the session live.
///
/// Dropping or closing the stream is transport teardown: every pending
/// reply rejects with a terminal error and the node's tables clear.
pub struct CapnodeStream {
    inner: Arc<NodeInner>,
    epoch: u64,
}

impl CapnodeStream {
    pub(crate) fn new(inner: Arc<NodeInner>, epoch: u64) -> Self {
        CapnodeStream { inner, epoch }
    }
}

impl Stream for CapnodeStream {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.inner.poll_next_outbound(cx, self.epoch)
    }
}

impl Sink<Message> for CapnodeStream {
    type Error = RpcError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), RpcError>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, msg: Message) -> Result<(), RpcError> {
        NodeInner::dispatch(&self.inner, msg)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), RpcError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), RpcError>> {
        self.inner.close_transport(self.epoch, "stream closed");
        Poll::Ready(Ok(()))
    }
}

impl Drop for CapnodeStream {
    fn drop(&mut self) {
        self.inner.close_transport(self.epoch, "stream dropped");
    }
}

/// Connect two nodes by cross-piping their streams in both directions.
///
/// The first init from each side seeds the remote API on the other. The
/// returned handles pump messages until either side's stream ends; aborting
/// them tears the link down on both nodes.
pub fn pipe(a: &Capnode, b: &Capnode) -> (JoinHandle<()>, JoinHandle<()>) {
    let (a_sink, a_stream) = a.attach_stream().split();
    let (b_sink, b_stream) = b.attach_stream().split();
    (pump(a_stream, b_sink), pump(b_stream, a_sink))
}

fn pump(
    mut from: SplitStream<CapnodeStream>,
    mut into: SplitSink<CapnodeStream, Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = from.next().await {
            if let Err(err) = into.send(msg).await {
                warn!(%err, "peer rejected message");
            }
        }
        let _ = into.close().await;
    })
}
