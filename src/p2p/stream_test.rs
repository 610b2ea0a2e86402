use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::Error;
use crate::p2p::stream::{ChannelStream, StreamState};
use crate::p2p::webrtc::new_peer_connection;
use crate::p2p::TunnelStream;

#[tokio::test]
async fn read_blocks_until_bytes_arrive() {
    let state = StreamState::new();

    let reader_state = Arc::clone(&state);
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 8];
        let n = reader_state.read_into(&mut buf).await;
        (n, buf)
    });

    sleep(Duration::from_millis(50)).await;
    assert!(!reader.is_finished());

    state.push(b"abc").await;
    let (n, buf) = timeout(Duration::from_secs(1), reader)
        .await
        .expect("reader still blocked")
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf[..3], b"abc");
}

#[tokio::test]
async fn blocked_reader_wakes_on_close() {
    let state = StreamState::new();

    let reader_state = Arc::clone(&state);
    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 4];
        reader_state.read_into(&mut buf).await
    });

    sleep(Duration::from_millis(50)).await;
    state.shut();

    let n = timeout(Duration::from_secs(1), reader)
        .await
        .expect("reader did not wake on close")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn buffered_bytes_survive_close() {
    let state = StreamState::new();
    state.push(b"foobar").await;
    state.shut();

    let mut buf = [0u8; 4];
    assert_eq!(state.read_into(&mut buf).await, 4);
    assert_eq!(&buf, b"foob");
    assert_eq!(state.read_into(&mut buf).await, 2);
    assert_eq!(&buf[..2], b"ar");
    assert_eq!(state.read_into(&mut buf).await, 0);
}

#[tokio::test]
async fn wakes_coalesce_without_losing_bytes() {
    let state = StreamState::new();
    for _ in 0..10 {
        state.push(b"x").await;
    }

    let mut buf = [0u8; 64];
    assert_eq!(state.read_into(&mut buf).await, 10);

    state.shut();
    assert_eq!(state.read_into(&mut buf).await, 0);
}

#[tokio::test]
async fn shut_is_idempotent() {
    let state = StreamState::new();
    assert!(!state.shut());
    assert!(state.shut());
    assert!(state.is_closed());
}

/// Two peer connections negotiated in-process (host candidates only), with a
/// channel stream on each end of one data channel.
async fn connected_stream_pair() -> (
    Arc<ChannelStream>,
    Arc<ChannelStream>,
    Arc<RTCPeerConnection>,
    Arc<RTCPeerConnection>,
) {
    let pc_a = new_peer_connection(&[]).await.unwrap();
    let pc_b = new_peer_connection(&[]).await.unwrap();

    let (remote_tx, remote_rx) = oneshot::channel::<Arc<ChannelStream>>();
    let remote_tx = Arc::new(std::sync::Mutex::new(Some(remote_tx)));
    pc_b.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let remote_tx = Arc::clone(&remote_tx);
        Box::pin(async move {
            let stream = ChannelStream::new(Arc::clone(&dc));
            let remote_tx = Arc::clone(&remote_tx);
            dc.on_open(Box::new(move || {
                Box::pin(async move {
                    if let Some(tx) = remote_tx.lock().unwrap().take() {
                        let _ = tx.send(stream);
                    }
                })
            }));
        })
    }));

    let dc_a = pc_a.create_data_channel("1", None).await.unwrap();
    let (open_tx, open_rx) = oneshot::channel::<()>();
    dc_a.on_open(Box::new(move || {
        let _ = open_tx.send(());
        Box::pin(async {})
    }));
    let stream_a = ChannelStream::new(Arc::clone(&dc_a));

    let offer = pc_a.create_offer(None).await.unwrap();
    let mut gather_a = pc_a.gathering_complete_promise().await;
    pc_a.set_local_description(offer).await.unwrap();
    let _ = gather_a.recv().await;
    let offer = pc_a.local_description().await.unwrap();

    pc_b.set_remote_description(offer).await.unwrap();
    let answer = pc_b.create_answer(None).await.unwrap();
    let mut gather_b = pc_b.gathering_complete_promise().await;
    pc_b.set_local_description(answer).await.unwrap();
    let _ = gather_b.recv().await;
    let answer = pc_b.local_description().await.unwrap();
    pc_a.set_remote_description(answer).await.unwrap();

    if dc_a.ready_state() != RTCDataChannelState::Open {
        timeout(Duration::from_secs(10), open_rx)
            .await
            .expect("data channel never opened")
            .unwrap();
    }
    let stream_b = timeout(Duration::from_secs(10), remote_rx)
        .await
        .expect("remote stream never arrived")
        .unwrap();

    (stream_a, stream_b, pc_a, pc_b)
}

#[tokio::test]
async fn bytes_cross_the_channel_in_order() {
    let (stream_a, stream_b, _pc_a, _pc_b) = connected_stream_pair().await;

    stream_a.write(b"hello ").await.unwrap();
    stream_a.write(b"world").await.unwrap();

    let mut collected = Vec::new();
    while collected.len() < 11 {
        let mut buf = [0u8; 4];
        let n = timeout(Duration::from_secs(10), stream_b.read(&mut buf))
            .await
            .expect("read stalled")
            .unwrap();
        assert!(n > 0, "unexpected EOF after {} bytes", collected.len());
        collected.extend_from_slice(&buf[..n]);
    }
    assert_eq!(collected, b"hello world");
}

#[tokio::test]
async fn close_drains_pending_bytes_then_fails_writes() {
    let (stream_a, stream_b, _pc_a, _pc_b) = connected_stream_pair().await;

    stream_a.write(b"tail").await.unwrap();
    stream_a.close().await.unwrap();

    // close is idempotent
    stream_a.close().await.unwrap();

    // a local write after close fails without transferring anything
    match stream_a.write(b"nope").await {
        Err(Error::ErrClosedPipe) => {}
        other => panic!("expected closed pipe error, got {other:?}"),
    }

    // the receiver drains every byte written before the close, then sees EOF
    let mut collected = Vec::new();
    loop {
        let mut buf = [0u8; 16];
        let n = timeout(Duration::from_secs(10), stream_b.read(&mut buf))
            .await
            .expect("read stalled")
            .unwrap();
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
    }
    assert_eq!(collected, b"tail");
    assert!(stream_b.is_closed());

    match stream_b.write(b"late").await {
        Err(Error::ErrClosedPipe) => {}
        other => panic!("expected closed pipe error, got {other:?}"),
    }
}
