//! Glue that drives a node over a byte transport.

use crate::codec::FrameFormat;
use crate::transport::{FramedTransport, MessageTransport, TransportError};
use capnode_core::Capnode;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::task::JoinHandle;
use tracing::warn;

const MEMORY_PIPE_CAPACITY: usize = 64 * 1024;

/// Drive `node` over `transport` until either side closes.
///
/// Outbound messages are pulled from the node's stream and framed out;
/// inbound frames feed the dispatcher. A protocol anomaly in a single
/// inbound message is logged and the session stays live, but when the byte
/// stream ends or fails the node's transport tears down and pending replies
/// reject.
pub fn bind<T>(node: &Capnode, mut transport: T) -> JoinHandle<Result<(), TransportError>>
where
    T: MessageTransport + 'static,
{
    let mut stream = node.attach_stream();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                outbound = stream.next() => match outbound {
                    Some(msg) => {
                        if let Err(err) = transport.send(msg).await {
                            let _ = stream.close().await;
                            return Err(err);
                        }
                    }
                    None => {
                        let _ = transport.close().await;
                        return Ok(());
                    }
                },
                inbound = transport.recv() => match inbound {
                    Ok(Some(msg)) => {
                        if let Err(err) = stream.send(msg).await {
                            warn!(%err, "inbound message rejected");
                        }
                    }
                    Ok(None) => {
                        let _ = stream.close().await;
                        return Ok(());
                    }
                    Err(err) => {
                        let _ = stream.close().await;
                        return Err(err);
                    }
                },
            }
        }
    })
}

/// [`bind`] over a raw byte stream with the given frame format.
pub fn bind_io<T>(
    node: &Capnode,
    io: T,
    format: FrameFormat,
) -> JoinHandle<Result<(), TransportError>>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    bind(node, FramedTransport::new(io, format))
}

/// An in-process pair of connected byte-duplex ends.
pub fn memory_pair() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(MEMORY_PIPE_CAPACITY)
}

/// Wire two nodes together over an in-memory byte link.
pub fn link(
    a: &Capnode,
    b: &Capnode,
    format: FrameFormat,
) -> (
    JoinHandle<Result<(), TransportError>>,
    JoinHandle<Result<(), TransportError>>,
) {
    let (x, y) = memory_pair();
    (bind_io(a, x, format), bind_io(b, y, format))
}
