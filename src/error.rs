use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// ErrClosedPipe indicates a write on a ChannelStream whose data channel
    /// has been closed, locally or by the remote.
    #[error("channel stream closed")]
    ErrClosedPipe,

    /// ErrSessionHeld indicates an offer arrived at an exit node that already
    /// has a bound source peer.
    #[error("already have source peer")]
    ErrSessionHeld,

    /// ErrSignalingStatus indicates a non-200 response to the offer POST.
    #[error("signaling over HTTP failed, status: {0}")]
    ErrSignalingStatus(u16),

    /// ErrMissingDescription indicates a peer connection without a usable
    /// local session description after negotiation.
    #[error("missing local session description")]
    ErrMissingDescription,

    /// ErrKeyLength indicates an encoded key that does not decode to exactly
    /// 32 bytes.
    #[error("key length mismatch, have: {have}, expected: 32")]
    ErrKeyLength { have: usize },

    /// ErrSealedTooShort indicates a sealed message shorter than a nonce.
    #[error("sealed message too short: {have} bytes")]
    ErrSealedTooShort { have: usize },

    /// ErrCryptoSeal indicates a box encryption failure.
    #[error("box seal failed")]
    ErrCryptoSeal,

    /// ErrCryptoOpen indicates an authentication failure opening a box.
    #[error("box open failed")]
    ErrCryptoOpen,

    /// ErrNoHomeDir indicates the user's home directory could not be resolved.
    #[error("home directory not found")]
    ErrNoHomeDir,

    #[error("webrtc: {0}")]
    Webrtc(#[from] webrtc::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("http request: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("url: {0}")]
    Url(#[from] url::ParseError),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("socks: {0}")]
    Socks(#[from] fast_socks5::SocksError),
}
