//! The message-level transport seam.

use crate::codec::{CodecError, FrameFormat, MessageCodec};
use async_trait::async_trait;
use capnode_core::Message;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A reliable, ordered, bidirectional message channel.
///
/// The runtime assumes nothing about the bytes underneath; anything that can
/// carry whole [`Message`]s in order can back a node.
#[async_trait]
pub trait MessageTransport: Send {
    async fn send(&mut self, msg: Message) -> Result<(), TransportError>;
    async fn recv(&mut self) -> Result<Option<Message>, TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// [`MessageTransport`] over any framed byte stream.
pub struct FramedTransport<T> {
    framed: Framed<T, MessageCodec>,
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> FramedTransport<T> {
    pub fn new(io: T, format: FrameFormat) -> Self {
        FramedTransport {
            framed: Framed::new(io, MessageCodec::new(format)),
        }
    }
}

#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send> MessageTransport for FramedTransport<T> {
    async fn send(&mut self, msg: Message) -> Result<(), TransportError> {
        self.framed.send(msg).await.map_err(TransportError::from)
    }

    async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        match self.framed.next().await {
            None => Ok(None),
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(err)) => Err(err.into()),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.framed.close().await.map_err(TransportError::from)
    }
}
