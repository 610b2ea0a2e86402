pub mod http;
pub mod socks;
pub mod stream;
pub mod tcp;
pub mod webrtc;

#[cfg(test)]
mod http_test;
#[cfg(test)]
mod stream_test;
#[cfg(test)]
mod webrtc_test;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use self::http::{serve_signaling, SignalHandlerFn};
pub use self::socks::SocksProxy;
pub use self::stream::ChannelStream;
pub use self::tcp::{serve_conn, StreamFactory, TcpConn, TcpProxy};
pub use self::webrtc::{AnswerEnvelope, OfferEnvelope, SdpBundle, WebRtcPeer};

/// Size of every per-direction copy buffer, and the initial capacity of a
/// ChannelStream's inbound buffer.
///
/// The default in `std::io::copy` is 8 KiB; on source nodes this is probably
/// fine, on relays and exits (especially embedded devices) it can be
/// important to tune.
pub const TRANSFER_BUF_SIZE: usize = 30 * 1024;

/// A bidirectional byte stream with shared-reference operations, so a single
/// handle can serve both directions of a tunnel concurrently.
///
/// `read` blocks until data is available and reports end-of-stream as
/// `Ok(0)`. This is the only seam the TCP proxy knows about: the downstream
/// side of a tunnel is whatever the proxy's factory produces.
#[async_trait]
pub trait TunnelStream {
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;
    async fn write(&self, buf: &[u8]) -> Result<usize>;
    async fn close(&self) -> Result<()>;
}

/// Shared handle to a [`TunnelStream`] trait object.
pub type DynStream = Arc<dyn TunnelStream + Send + Sync>;
