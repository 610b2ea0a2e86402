use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use crypto_box::PublicKey;

use crate::crypto::keys::{decode_key, encode_key, NodeKey};
use crate::error::Error;

#[test]
fn zero_key_encodes_to_43_chars_without_padding() {
    let key = PublicKey::from([0u8; 32]);
    let encoded = encode_key(&key);
    assert_eq!(encoded, "A".repeat(43));
    assert_eq!(decode_key(&encoded).unwrap().as_bytes(), key.as_bytes());
}

#[test]
fn high_bytes_use_the_url_safe_alphabet() {
    let mut bytes = [0xffu8; 32];
    bytes[0] = 0xfb;
    let encoded = encode_key(&PublicKey::from(bytes));

    assert!(!encoded.contains('+'));
    assert!(!encoded.contains('/'));
    assert!(!encoded.contains('='));
    assert!(encoded.contains('-') || encoded.contains('_'));
    assert_eq!(decode_key(&encoded).unwrap().as_bytes(), &bytes);
}

#[test]
fn decode_rejects_wrong_decoded_length() {
    let short = URL_SAFE_NO_PAD.encode([1u8; 31]);
    match decode_key(&short) {
        Err(Error::ErrKeyLength { have }) => assert_eq!(have, 31),
        other => panic!("expected key length error, got {other:?}"),
    }

    let long = URL_SAFE_NO_PAD.encode([1u8; 33]);
    assert!(decode_key(&long).is_err());

    assert!(decode_key("not/base64+data=").is_err());
}

#[test]
fn key_json_round_trip() {
    let key = NodeKey::generate();
    let json = key.to_json().unwrap();
    let restored = NodeKey::from_json(&json).unwrap();
    assert_eq!(restored.public().as_bytes(), key.public().as_bytes());
    assert_eq!(restored.secret().to_bytes(), key.secret().to_bytes());
}

#[test]
fn load_or_generate_persists_the_key() {
    let path = std::env::temp_dir().join(format!("orchid-key-test-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let first = NodeKey::load_or_generate(&path).unwrap();
    let second = NodeKey::load_or_generate(&path).unwrap();
    assert_eq!(first.public().as_bytes(), second.public().as_bytes());

    let _ = std::fs::remove_file(&path);
}
