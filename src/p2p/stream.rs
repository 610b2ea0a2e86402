//! Byte-stream adapter over a WebRTC data channel.
//!
//! Data channels are message oriented; the tunnel pumps want a plain
//! bidirectional byte stream with read/write/close semantics. ChannelStream
//! buffers inbound messages in arrival order and parks an empty-buffer reader
//! on a coalesced wake signal until bytes arrive or the channel closes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::{Mutex, Notify};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

use crate::error::{Error, Result};
use crate::p2p::{TunnelStream, TRANSFER_BUF_SIZE};

/// Inbound half of a channel stream: the FIFO read buffer, the monotonic
/// closed flag and the reader wake signal.
///
/// `Notify` holds at most one stored permit, so repeated wakes coalesce; a
/// woken reader re-checks the buffer and the closed flag, which is all the
/// signal ever means.
pub(crate) struct StreamState {
    read_buf: Mutex<BytesMut>,
    closed: AtomicBool,
    read_notifier: Notify,
}

impl StreamState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            read_buf: Mutex::new(BytesMut::with_capacity(TRANSFER_BUF_SIZE)),
            closed: AtomicBool::new(false),
            read_notifier: Notify::new(),
        })
    }

    /// Appends inbound bytes and wakes a parked reader.
    pub(crate) async fn push(&self, data: &[u8]) {
        {
            let mut read_buf = self.read_buf.lock().await;
            read_buf.extend_from_slice(data);
        }
        self.read_notifier.notify_one();
    }

    /// Marks the stream closed and wakes a parked reader so it can observe
    /// EOF. Returns whether the stream was already closed.
    pub(crate) fn shut(&self) -> bool {
        let was_closed = self.closed.swap(true, Ordering::SeqCst);
        self.read_notifier.notify_one();
        was_closed
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Copies up to `buf.len()` buffered bytes into `buf`, blocking while the
    /// buffer is empty and the stream is open. Returns 0 only at EOF.
    pub(crate) async fn read_into(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        loop {
            {
                let mut read_buf = self.read_buf.lock().await;
                if !read_buf.is_empty() {
                    let n = buf.len().min(read_buf.len());
                    buf[..n].copy_from_slice(&read_buf[..n]);
                    read_buf.advance(n);
                    return n;
                }
                if self.is_closed() {
                    return 0;
                }
            }
            self.read_notifier.notified().await;
        }
    }
}

/// Presents one data channel as a [`TunnelStream`].
///
/// The stream owns the channel's `on_message`/`on_close` callbacks; the peer
/// connection keeps the channel alive only through list membership.
pub struct ChannelStream {
    dc: Arc<RTCDataChannel>,
    state: Arc<StreamState>,
    write_lock: Mutex<()>,
}

impl ChannelStream {
    /// Wraps an open data channel, installing its message and close callbacks.
    pub fn new(dc: Arc<RTCDataChannel>) -> Arc<Self> {
        let state = StreamState::new();

        let message_state = Arc::clone(&state);
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let state = Arc::clone(&message_state);
            Box::pin(async move {
                state.push(&msg.data).await;
            })
        }));

        let close_state = Arc::clone(&state);
        dc.on_close(Box::new(move || {
            let state = Arc::clone(&close_state);
            Box::pin(async move {
                log::debug!("data channel closed by remote");
                state.shut();
            })
        }));

        Arc::new(Self {
            dc,
            state,
            write_lock: Mutex::new(()),
        })
    }

    pub fn label(&self) -> &str {
        self.dc.label()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }
}

#[async_trait]
impl TunnelStream for ChannelStream {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.state.read_into(buf).await)
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        // The write lock serializes sends; it is disjoint from the read state
        // so a stalled writer never blocks inbound message delivery.
        let _guard = self.write_lock.lock().await;
        if self.state.is_closed() {
            return Err(Error::ErrClosedPipe);
        }
        // The channel may retain the payload past the call; never hand it the
        // caller's buffer.
        let payload = Bytes::copy_from_slice(buf);
        self.dc.send(&payload).await?;
        Ok(buf.len())
    }

    async fn close(&self) -> Result<()> {
        if self.state.shut() {
            return Ok(());
        }
        self.dc.close().await?;
        Ok(())
    }
}
