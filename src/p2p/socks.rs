//! Exit-side SOCKS5 adapter.
//!
//! The exit streams tunnel bytes into a locally hosted SOCKS5 server, which
//! performs the outbound connections. The server itself is an external
//! library; this just binds it to a loopback port and drives the accept loop.

use fast_socks5::server::{AcceptAuthentication, Config, Socks5Server};
use futures::StreamExt;

use crate::error::Result;

#[derive(Default)]
pub struct SocksProxy;

impl SocksProxy {
    pub fn new() -> Self {
        Self
    }

    /// Starts the SOCKS5 server on `127.0.0.1:port` and serves until the
    /// listener fails.
    pub async fn listen_and_serve(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{port}");
        let server = <Socks5Server>::bind(addr.as_str())
            .await?
            .with_config(Config::<AcceptAuthentication>::default());
        log::info!("socks5 proxy listening on {addr}");

        let mut incoming = server.incoming();
        while let Some(conn) = incoming.next().await {
            match conn {
                Ok(socket) => {
                    tokio::spawn(async move {
                        if let Err(err) = socket.upgrade_to_socks5().await {
                            log::error!("socks5 session: {err}");
                        }
                    });
                }
                Err(err) => log::error!("socks5 accept: {err}"),
            }
        }
        Ok(())
    }
}
