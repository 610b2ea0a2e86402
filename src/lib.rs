#![warn(rust_2018_idioms)]

//! orchid-lib: a two-role peer-to-peer proxy for the Orchid onion-routing
//! protocol.
//!
//! A **source** node accepts local TCP connections from a browser configured
//! to use a SOCKS5 proxy and forwards each connection over a WebRTC data
//! channel to a remote **exit** node. The exit terminates every tunnel into a
//! locally hosted SOCKS5 server, which performs the actual outbound connection.
//! Peers find each other by exchanging an SDP offer/answer bundle over a plain
//! HTTP signaling channel.

pub mod crypto;
pub mod error;
pub mod node;
pub mod p2p;
pub mod util;

pub use error::{Error, Result};
