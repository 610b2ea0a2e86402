//! WebRTC peer lifecycle and signaling driver.
//!
//! The connectivity sequence follows the W3C WebRTC 1.0 steps 1-10, see
//! <https://developer.mozilla.org/en-US/docs/Web/API/WebRTC_API/Connectivity>
//! for a description of the specific steps executed here and
//! <https://www.w3.org/TR/webrtc/> for the full protocol spec.
//!
//! The underlying stack is callback driven; everything the negotiation needs
//! is forwarded into a bounded event queue and the offer/answer sequence is
//! driven by receiving from it, so ordering stays auditable in one place.

use std::sync::Arc;

use hyper::{Body, Client, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use url::Url;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::{Error, Result};
use crate::p2p::ChannelStream;

/// Backlog of the per-peer negotiation event queue.
const PEER_EVENT_BACKLOG: usize = 16;

/// A session description plus the ICE candidates gathered for it.
///
/// This JSON schema is temp in lieu of first protocol spec lockdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdpBundle {
    pub description: RTCSessionDescription,
    /// Entries may be null on the wire; readers tolerate and skip them.
    #[serde(rename = "Candidates", default)]
    pub candidates: Vec<Option<RTCIceCandidateInit>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferEnvelope {
    pub offer: SdpBundle,
}

/// Answer response. The extra fields are reserved protocol fields; they may
/// be zero or missing and readers must tolerate that.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    pub answer: SdpBundle,
    /// URL-safe base64 public key of the answering node.
    #[serde(rename = "nodePub", default)]
    pub node_pub: String,
    #[serde(rename = "ethBlock", default)]
    pub eth_block: u32,
    /// Reserved for Equihash.
    #[serde(rename = "powSolution", default)]
    pub pow_solution: u64,
    /// Redundant copy of the answer SDP.
    #[serde(rename = "answerSDP", default)]
    pub answer_sdp: String,
}

/// Negotiation events forwarded out of the stack's callbacks.
enum PeerEvent {
    Candidate(RTCIceCandidateInit),
    GatheringComplete,
}

struct ChannelTable {
    list: Vec<Arc<RTCDataChannel>>,
    /// Labels are the decimal rendering of this counter; unique per peer.
    next_label: u64,
}

/// One peer connection and the data channels multiplexed over it.
pub struct WebRtcPeer {
    ref_url: Option<Url>,
    pc: Arc<RTCPeerConnection>,
    channels: Mutex<ChannelTable>,
    local_candidates: Vec<RTCIceCandidateInit>,
}

impl WebRtcPeer {
    /// Source side: dials the exit referenced by `ref_url`.
    ///
    /// Executes steps 1-3 and 9-10 locally; the POST to the exit's signaling
    /// endpoint triggers 4-8 at the remote.
    pub async fn connect(ref_url: Url, stun_servers: &[String]) -> Result<Arc<Self>> {
        let pc = new_peer_connection(stun_servers).await?;

        let (event_tx, mut event_rx) = mpsc::channel(PEER_EVENT_BACKLOG);
        install_candidate_forwarder(&pc, event_tx);
        install_observers(&pc);

        // A data channel must exist before the offer or ICE gathering never
        // starts.
        let seed = pc.create_data_channel("0", None).await?;

        // Steps 1-2: create the offer and set it as the local description,
        // which kicks off gathering.
        let offer = pc.create_offer(None).await?;
        let mut gather_done = pc.gathering_complete_promise().await;
        pc.set_local_description(offer).await?;

        let local_candidates = drain_candidates(&mut event_rx, &mut gather_done).await;

        let description = pc
            .local_description()
            .await
            .ok_or(Error::ErrMissingDescription)?;
        let envelope = OfferEnvelope {
            offer: SdpBundle {
                description,
                candidates: local_candidates.iter().cloned().map(Some).collect(),
            },
        };
        let payload = serde_json::to_vec(&envelope)?;

        // Step 3: offer and candidates over the signaling channel, HTTP(S)
        // for now. This triggers steps 4-8 at the remote.
        let uri = ref_url.join("/")?.to_string();
        log::debug!("posting offer to {uri}");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload))?;
        let response = Client::new().request(request).await?;

        // Step 9: receive and validate the answer.
        if response.status() != StatusCode::OK {
            return Err(Error::ErrSignalingStatus(response.status().as_u16()));
        }
        let body = hyper::body::to_bytes(response.into_body()).await?;
        let answer: AnswerEnvelope = serde_json::from_slice(&body)?;

        // Step 10: apply the answer SDP, then the remote candidates.
        pc.set_remote_description(answer.answer.description).await?;
        add_remote_candidates(&pc, answer.answer.candidates).await?;

        Ok(Arc::new(Self {
            ref_url: Some(ref_url),
            pc,
            channels: Mutex::new(ChannelTable {
                list: vec![seed],
                next_label: 0,
            }),
            local_candidates,
        }))
    }

    /// Exit side: consumes a raw offer request body and produces the answer
    /// response body plus the bound peer.
    ///
    /// Every incoming data channel except the seed `"0"` is wrapped in a
    /// [`ChannelStream`] and delivered on `ready_tx` once it opens. Delivery
    /// blocks when the slot is full, so a too-small capacity stalls channel
    /// arrival; size it for bursts of tunnel opens.
    pub async fn accept_offer(
        body: &[u8],
        ready_tx: mpsc::Sender<Arc<ChannelStream>>,
        stun_servers: &[String],
        node_pub: Option<String>,
    ) -> Result<(Vec<u8>, Arc<Self>)> {
        let envelope: OfferEnvelope = serde_json::from_slice(body)?;
        let offer = envelope.offer;
        for (i, candidate) in offer.candidates.iter().enumerate() {
            match candidate {
                Some(c) => log::debug!(
                    "offer candidate {i}: {} sdpMid={:?} sdpMLineIndex={:?}",
                    c.candidate,
                    c.sdp_mid,
                    c.sdp_mline_index
                ),
                None => log::warn!("received nil ICE candidate at index {i}"),
            }
        }

        // Step 4: a peer connection with the same configuration.
        let pc = new_peer_connection(stun_servers).await?;

        let (event_tx, mut event_rx) = mpsc::channel(PEER_EVENT_BACKLOG);
        install_candidate_forwarder(&pc, event_tx);
        install_observers(&pc);

        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let ready_tx = ready_tx.clone();
            Box::pin(async move {
                if dc.label() == "0" {
                    // The seed channel only exists to trigger ICE gathering
                    // at the source.
                    log::debug!("ignoring seed data channel");
                    return;
                }
                log::debug!("incoming data channel {:?}", dc.label());
                let stream = ChannelStream::new(Arc::clone(&dc));
                dc.on_open(Box::new(move || {
                    Box::pin(async move {
                        if ready_tx.send(stream).await.is_err() {
                            log::warn!("channel ready consumer gone, dropping stream");
                        }
                    })
                }));
            })
        }));

        pc.set_remote_description(offer.description).await?;
        add_remote_candidates(&pc, offer.candidates).await?;

        // Steps 6-8: answer, local description, gathering.
        let answer = pc.create_answer(None).await?;
        let mut gather_done = pc.gathering_complete_promise().await;
        pc.set_local_description(answer).await?;

        let local_candidates = drain_candidates(&mut event_rx, &mut gather_done).await;

        let description = pc
            .local_description()
            .await
            .ok_or(Error::ErrMissingDescription)?;
        let response = AnswerEnvelope {
            answer_sdp: description.sdp.clone(),
            answer: SdpBundle {
                description,
                candidates: local_candidates.iter().cloned().map(Some).collect(),
            },
            node_pub: node_pub.unwrap_or_default(),
            eth_block: 0,
            pow_solution: 0,
        };
        let payload = serde_json::to_vec(&response)?;

        let peer = Arc::new(Self {
            ref_url: None,
            pc,
            channels: Mutex::new(ChannelTable {
                list: Vec::new(),
                next_label: 0,
            }),
            local_candidates,
        });
        Ok((payload, peer))
    }

    /// Creates the next data channel on this peer, labelled with the peer's
    /// monotonically increasing counter.
    pub async fn new_data_channel(&self) -> Result<Arc<RTCDataChannel>> {
        let mut table = self.channels.lock().await;
        table.next_label += 1;
        let label = table.next_label.to_string();
        let dc = self.pc.create_data_channel(&label, None).await?;
        table.list.push(Arc::clone(&dc));
        Ok(dc)
    }

    /// Creates a data channel, waits for it to open and wraps it in a
    /// [`ChannelStream`]. This is what the source's TCP proxy factory calls
    /// per accepted connection.
    pub async fn open_stream(&self) -> Result<Arc<ChannelStream>> {
        let dc = self.new_data_channel().await?;

        let (open_tx, open_rx) = oneshot::channel::<()>();
        dc.on_open(Box::new(move || {
            let _ = open_tx.send(());
            Box::pin(async {})
        }));

        let stream = ChannelStream::new(Arc::clone(&dc));
        if dc.ready_state() != RTCDataChannelState::Open {
            let _ = open_rx.await;
        }
        log::debug!("data channel {:?} open", stream.label());
        Ok(stream)
    }

    pub fn ref_url(&self) -> Option<&Url> {
        self.ref_url.as_ref()
    }

    /// ICE candidates gathered locally during negotiation.
    pub fn local_candidates(&self) -> &[RTCIceCandidateInit] {
        &self.local_candidates
    }

    pub async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        Ok(())
    }
}

/// Builds a peer connection with the shared API configuration. An empty
/// server list disables STUN and gathers host candidates only.
pub(crate) async fn new_peer_connection(
    stun_servers: &[String],
) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = if stun_servers.is_empty() {
        Vec::new()
    } else {
        vec![RTCIceServer {
            urls: stun_servers.to_vec(),
            ..Default::default()
        }]
    };
    let config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    Ok(Arc::new(api.new_peer_connection(config).await?))
}

/// Forwards gathered ICE candidates into the negotiation event queue; the
/// end-of-gathering callback (a `None` candidate) becomes a completion event.
fn install_candidate_forwarder(pc: &RTCPeerConnection, event_tx: mpsc::Sender<PeerEvent>) {
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let event_tx = event_tx.clone();
        Box::pin(async move {
            match candidate {
                Some(candidate) => match candidate.to_json() {
                    Ok(init) => {
                        log::debug!("gathered ICE candidate: {}", init.candidate);
                        let _ = event_tx.send(PeerEvent::Candidate(init)).await;
                    }
                    Err(err) => log::warn!("ice candidate to_json: {err}"),
                },
                None => {
                    let _ = event_tx.send(PeerEvent::GatheringComplete).await;
                }
            }
        })
    }));
}

/// State-transition callbacks, observational only.
fn install_observers(pc: &RTCPeerConnection) {
    pc.on_peer_connection_state_change(Box::new(|s: RTCPeerConnectionState| {
        log::debug!("peer connection state: {s}");
        Box::pin(async {})
    }));
    pc.on_ice_connection_state_change(Box::new(|s: RTCIceConnectionState| {
        log::debug!("ice connection state: {s}");
        Box::pin(async {})
    }));
    pc.on_ice_gathering_state_change(Box::new(|s: RTCIceGathererState| {
        log::debug!("ice gathering state: {s:?}");
        Box::pin(async {})
    }));
    pc.on_signaling_state_change(Box::new(|s: RTCSignalingState| {
        log::debug!("signaling state: {s:?}");
        Box::pin(async {})
    }));
}

/// Receives negotiation events until gathering completes and returns the
/// candidates collected along the way. The list starts empty and only real
/// candidates are appended.
async fn drain_candidates(
    event_rx: &mut mpsc::Receiver<PeerEvent>,
    gather_done: &mut mpsc::Receiver<()>,
) -> Vec<RTCIceCandidateInit> {
    let mut candidates = Vec::new();
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(PeerEvent::Candidate(init)) => candidates.push(init),
                Some(PeerEvent::GatheringComplete) | None => break,
            },
            _ = gather_done.recv() => break,
        }
    }
    // Candidates already queued when gathering completed.
    while let Ok(event) = event_rx.try_recv() {
        if let PeerEvent::Candidate(init) = event {
            candidates.push(init);
        }
    }
    candidates
}

/// Applies remote candidates, skipping nil and empty entries.
async fn add_remote_candidates(
    pc: &RTCPeerConnection,
    candidates: Vec<Option<RTCIceCandidateInit>>,
) -> Result<()> {
    for candidate in candidates.into_iter().flatten() {
        if candidate.candidate.is_empty() {
            continue;
        }
        log::debug!("adding remote ICE candidate: {}", candidate.candidate);
        pc.add_ice_candidate(candidate).await?;
    }
    Ok(())
}
