use crate::p2p::webrtc::{AnswerEnvelope, OfferEnvelope};

#[test]
fn offer_envelope_wire_shape() {
    let raw = r#"{"offer":{"description":{"type":"offer","sdp":"v=0\r\n"},"Candidates":[{"candidate":"candidate:1 1 UDP 2130706431 127.0.0.1 54321 typ host","sdpMid":"0","sdpMLineIndex":0},null]}}"#;
    let envelope: OfferEnvelope = serde_json::from_str(raw).unwrap();

    assert_eq!(envelope.offer.description.sdp, "v=0\r\n");
    assert_eq!(envelope.offer.candidates.len(), 2);
    assert!(envelope.offer.candidates[1].is_none());
    let candidate = envelope.offer.candidates[0].as_ref().unwrap();
    assert!(candidate.candidate.starts_with("candidate:"));
    assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
    assert_eq!(candidate.sdp_mline_index, Some(0));

    let value = serde_json::to_value(&envelope).unwrap();
    assert_eq!(value["offer"]["description"]["type"], "offer");
    assert!(value["offer"]["Candidates"].is_array());
}

#[test]
fn answer_envelope_tolerates_missing_reserved_fields() {
    let raw = r#"{"answer":{"description":{"type":"answer","sdp":"v=0\r\n"},"Candidates":[]}}"#;
    let envelope: AnswerEnvelope = serde_json::from_str(raw).unwrap();

    assert_eq!(envelope.node_pub, "");
    assert_eq!(envelope.eth_block, 0);
    assert_eq!(envelope.pow_solution, 0);
    assert_eq!(envelope.answer_sdp, "");
    assert!(envelope.answer.candidates.is_empty());
}

#[test]
fn answer_envelope_tolerates_missing_candidate_list() {
    let raw = r#"{"answer":{"description":{"type":"answer","sdp":""}}}"#;
    let envelope: AnswerEnvelope = serde_json::from_str(raw).unwrap();
    assert!(envelope.answer.candidates.is_empty());
}

#[test]
fn answer_envelope_serializes_reserved_fields() {
    let value = serde_json::to_value(AnswerEnvelope::default()).unwrap();
    assert!(value.get("nodePub").is_some());
    assert!(value.get("ethBlock").is_some());
    assert!(value.get("powSolution").is_some());
    assert!(value.get("answerSDP").is_some());
}
