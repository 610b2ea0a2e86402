//! TCP proxy and tunnel copy pumps.
//!
//! On a source node a web browser talks to what it believes is a SOCKS5
//! proxy; locally it is just a TCP listener, and the SOCKS5 protocol is
//! handled at the exit. Each accepted connection is joined to a fresh
//! downstream stream produced by the proxy's factory, with one copy pump per
//! direction:
//!
//! ```text
//! request:  browser -> tcp (source) -> data channel -> socks5 (exit) -> site
//! response: site -> socks5 (exit) -> data channel -> tcp (source) -> browser
//! ```
//!
//! The factory closure is the only coupling to the WebRTC layer, which keeps
//! the proxy testable against in-memory streams.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::p2p::{DynStream, TunnelStream, TRANSFER_BUF_SIZE};

/// Produces a fresh downstream stream for each accepted proxy connection.
pub type StreamFactory =
    Box<dyn (Fn() -> Pin<Box<dyn Future<Output = Result<DynStream>> + Send>>) + Send + Sync>;

/// A [`TunnelStream`] over a TCP connection: split halves behind their own
/// locks so both pump directions can share one handle. `close` shuts down
/// the write half, which is what signals EOF to the remote.
pub struct TcpConn {
    rd: Mutex<OwnedReadHalf>,
    wr: Mutex<OwnedWriteHalf>,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        let (rd, wr) = stream.into_split();
        Self {
            rd: Mutex::new(rd),
            wr: Mutex::new(wr),
        }
    }
}

#[async_trait]
impl TunnelStream for TcpConn {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.rd.lock().await.read(buf).await?)
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut wr = self.wr.lock().await;
        wr.write_all(buf).await?;
        Ok(buf.len())
    }

    async fn close(&self) -> Result<()> {
        let mut wr = self.wr.lock().await;
        wr.shutdown().await?;
        Ok(())
    }
}

/// Moves bytes from `src` to `dst` in chunks of at most `buf.len()` until EOF
/// or an error, then signals completion exactly once on `done_tx`.
///
/// EOF is a clean termination; any other error is logged and ends the
/// direction. The pump never closes either endpoint, that is the caller's
/// job. With `idle_timeout` set, a read that sits idle past the deadline also
/// ends the direction.
pub(crate) async fn copy_buffer(
    src: DynStream,
    dst: DynStream,
    mut buf: Vec<u8>,
    done_tx: mpsc::Sender<()>,
    idle_timeout: Option<Duration>,
) {
    let mut streamed: u64 = 0;
    loop {
        let read = if let Some(limit) = idle_timeout {
            match tokio::time::timeout(limit, src.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    log::debug!("copy pump idle for {limit:?}, streamed {streamed} bytes");
                    break;
                }
            }
        } else {
            src.read(&mut buf).await
        };

        match read {
            Ok(0) => {
                log::debug!("copy pump closed with EOF, streamed {streamed} bytes");
                break;
            }
            Ok(n) => {
                if let Err(err) = dst.write(&buf[..n]).await {
                    log::info!("copy pump write: {err}, streamed {streamed} bytes");
                    break;
                }
                streamed += n as u64;
            }
            Err(err) => {
                log::info!("copy pump read: {err}, streamed {streamed} bytes");
                break;
            }
        }
    }
    let _ = done_tx.send(()).await;
}

/// Joins two streams into a full-duplex tunnel and runs it to completion.
///
/// When either pump finishes, both endpoints are closed (close errors are
/// logged, not propagated) and the other pump is awaited, so no pump task
/// outlives the tunnel.
pub async fn serve_conn(src: DynStream, dst: DynStream, idle_timeout: Option<Duration>) {
    let (src_done_tx, mut src_done_rx) = mpsc::channel::<()>(1);
    let (dst_done_tx, mut dst_done_rx) = mpsc::channel::<()>(1);

    tokio::spawn(copy_buffer(
        Arc::clone(&src),
        Arc::clone(&dst),
        vec![0u8; TRANSFER_BUF_SIZE],
        src_done_tx,
        idle_timeout,
    ));
    tokio::spawn(copy_buffer(
        Arc::clone(&dst),
        Arc::clone(&src),
        vec![0u8; TRANSFER_BUF_SIZE],
        dst_done_tx,
        idle_timeout,
    ));

    let src_first = tokio::select! {
        _ = src_done_rx.recv() => true,
        _ = dst_done_rx.recv() => false,
    };

    if let Err(err) = src.close().await {
        log::error!("src close: {err}");
    }
    if let Err(err) = dst.close().await {
        log::error!("dst close: {err}");
    }

    // Closing both endpoints unblocks the remaining pump; wait for it so the
    // tunnel is fully torn down before we return.
    if src_first {
        let _ = dst_done_rx.recv().await;
    } else {
        let _ = src_done_rx.recv().await;
    }
}

/// Listens on a local port and serves each accepted connection against a
/// stream produced by the factory.
pub struct TcpProxy {
    host: String,
    factory: StreamFactory,
    idle_timeout: Option<Duration>,
}

impl TcpProxy {
    pub fn new(port: u16, factory: StreamFactory, idle_timeout: Option<Duration>) -> Self {
        Self {
            host: format!("127.0.0.1:{port}"),
            factory,
            idle_timeout,
        }
    }

    /// Accept loop. A factory failure ends the loop and surfaces the error:
    /// it usually means the peer is gone, so accepting further connections
    /// would only produce dead tunnels.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.host).await?;
        log::info!("tcp proxy listening on {}", self.host);

        loop {
            let (conn, peer_addr) = listener.accept().await?;
            log::debug!("tcp proxy accepted {peer_addr}");

            let dst = (self.factory)().await?;
            let src: DynStream = Arc::new(TcpConn::new(conn));
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                serve_conn(src, dst, idle_timeout).await;
            });
        }
    }
}
