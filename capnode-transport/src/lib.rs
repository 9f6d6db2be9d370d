// Byte-level transports for capnode messages: frame codecs and the glue
// that drives a node over any AsyncRead + AsyncWrite.

pub mod bind;
pub mod codec;
pub mod transport;

pub use bind::{bind, bind_io, link, memory_pair};
pub use codec::{CodecError, FrameFormat, MessageCodec, DEFAULT_MAX_FRAME};
pub use transport::{FramedTransport, MessageTransport, TransportError};
