//! Node roles and session assembly.
//!
//! The source role wires a local TCP proxy to a WebRTC peer: one new data
//! channel per accepted connection. The exit role runs the signaling endpoint
//! and the embedded SOCKS5 server, and joins every arriving channel stream to
//! a fresh SOCKS5 connection. An exit holds at most one source peer.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use url::Url;

use crate::error::{Error, Result};
use crate::p2p::tcp::StreamFactory;
use crate::p2p::{
    serve_conn, serve_signaling, ChannelStream, DynStream, SignalHandlerFn, SocksProxy, TcpConn,
    TcpProxy, TunnelStream, WebRtcPeer,
};

pub const SOURCE_TCP_PORT: u16 = 3200;
pub const EXIT_HTTP_PORT: u16 = 3201;
pub const EXIT_SOCKS5_PORT: u16 = 3202;

/// TODO: remove once Orchid nodes implement STUN themselves.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

const DEFAULT_CHANNEL_BACKLOG: usize = 64;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Local port the source's TCP proxy (the browser-facing SOCKS5 address)
    /// listens on.
    pub source_tcp_port: u16,
    /// Port of the exit's signaling HTTP endpoint.
    pub exit_http_port: u16,
    /// Port of the exit's embedded SOCKS5 server.
    pub exit_socks_port: u16,
    /// Exit reference the source dials for signaling.
    pub exit_ref: String,
    /// STUN servers for ICE gathering; empty means host candidates only.
    pub stun_servers: Vec<String>,
    /// Optional idle deadline for tunnel copy pumps; `None` leaves tunnels
    /// open until either side closes.
    pub copy_idle_timeout: Option<Duration>,
    /// Capacity of the exit's channel-ready slot. Delivery of newly opened
    /// channels blocks once this many are waiting on the consumer.
    pub channel_backlog: usize,
    /// URL-safe base64 public key stamped into answer envelopes.
    pub node_pub: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            source_tcp_port: SOURCE_TCP_PORT,
            exit_http_port: EXIT_HTTP_PORT,
            exit_socks_port: EXIT_SOCKS5_PORT,
            exit_ref: format!("http://localhost:{EXIT_HTTP_PORT}"),
            stun_servers: vec![DEFAULT_STUN_SERVER.to_owned()],
            copy_idle_timeout: None,
            channel_backlog: DEFAULT_CHANNEL_BACKLOG,
            node_pub: None,
        }
    }
}

/// Exit admission state: at most one source peer may be bound.
/// TODO: generalize to a session map keyed by peer public key.
#[derive(Default)]
struct ExitSession {
    peer: Mutex<Option<Arc<WebRtcPeer>>>,
}

/// Runs a source node: negotiate with the exit, then serve the local TCP
/// proxy until it fails.
pub async fn run_source(cfg: NodeConfig) -> Result<()> {
    log::info!("starting source node");

    let ref_url = Url::parse(&cfg.exit_ref)?;
    let peer = WebRtcPeer::connect(ref_url, &cfg.stun_servers).await?;
    log::info!("source peer bound to exit at {}", cfg.exit_ref);

    let factory_peer = Arc::clone(&peer);
    let factory: StreamFactory = Box::new(move || {
        let peer = Arc::clone(&factory_peer);
        Box::pin(async move {
            let stream: DynStream = peer.open_stream().await?;
            Ok(stream)
        })
    });

    let proxy = TcpProxy::new(cfg.source_tcp_port, factory, cfg.copy_idle_timeout);
    proxy.listen_and_serve().await
}

/// Runs an exit node: SOCKS5 server plus the signaling endpoint, serving
/// offers until the endpoint fails.
pub async fn run_exit(cfg: NodeConfig) -> Result<()> {
    log::info!("starting exit node");

    let socks = SocksProxy::new();
    let socks_port = cfg.exit_socks_port;
    tokio::spawn(async move {
        if let Err(err) = socks.listen_and_serve(socks_port).await {
            log::error!("socks5 proxy: {err}");
        }
    });

    let session = Arc::new(ExitSession::default());
    let http_port = cfg.exit_http_port;
    let cfg = Arc::new(cfg);

    let handler: SignalHandlerFn = Arc::new(move |body: Vec<u8>| {
        let session = Arc::clone(&session);
        let cfg = Arc::clone(&cfg);
        Box::pin(async move {
            let mut slot = session.peer.lock().await;
            if slot.is_some() {
                return Err(Error::ErrSessionHeld);
            }

            let (ready_tx, ready_rx) = mpsc::channel::<Arc<ChannelStream>>(cfg.channel_backlog);
            spawn_channel_consumer(ready_rx, cfg.exit_socks_port, cfg.copy_idle_timeout);

            let (response, peer) = WebRtcPeer::accept_offer(
                &body,
                ready_tx,
                &cfg.stun_servers,
                cfg.node_pub.clone(),
            )
            .await?;
            *slot = Some(peer);
            Ok(response)
        })
    });

    log::info!("exit ready, signaling on port {http_port}");
    serve_signaling(http_port, handler).await
}

/// Joins each arriving channel stream to a fresh connection into the local
/// SOCKS5 server.
fn spawn_channel_consumer(
    mut ready_rx: mpsc::Receiver<Arc<ChannelStream>>,
    socks_port: u16,
    idle_timeout: Option<Duration>,
) {
    let socks_addr = format!("127.0.0.1:{socks_port}");
    tokio::spawn(async move {
        while let Some(stream) = ready_rx.recv().await {
            log::debug!("new tunnel channel {:?}", stream.label());
            let conn = match TcpStream::connect(&socks_addr).await {
                Ok(conn) => conn,
                Err(err) => {
                    // The session outlives a failed dial; keep draining so
                    // later channels still get served.
                    log::error!("dial local socks5: {err}");
                    if let Err(err) = stream.close().await {
                        log::error!("channel stream close: {err}");
                    }
                    continue;
                }
            };
            let src: DynStream = Arc::new(TcpConn::new(conn));
            let dst: DynStream = stream;
            tokio::spawn(async move {
                serve_conn(src, dst, idle_timeout).await;
            });
        }
    });
}
