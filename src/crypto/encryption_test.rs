use crate::crypto::encryption::NodeBox;
use crate::crypto::keys::NodeKey;
use crate::error::Error;

#[test]
fn seal_open_round_trip_between_peers() {
    let alice = NodeKey::generate();
    let bob = NodeKey::generate();
    let alice_box = NodeBox::new(bob.public(), alice.secret());
    let bob_box = NodeBox::new(alice.public(), bob.secret());

    let sealed = alice_box.seal(b"orchid test message").unwrap();
    assert_eq!(bob_box.open(&sealed).unwrap(), b"orchid test message");

    let sealed = bob_box.seal(b"reply").unwrap();
    assert_eq!(alice_box.open(&sealed).unwrap(), b"reply");
}

#[test]
fn open_rejects_tampered_ciphertext() {
    let alice = NodeKey::generate();
    let bob = NodeKey::generate();
    let alice_box = NodeBox::new(bob.public(), alice.secret());
    let bob_box = NodeBox::new(alice.public(), bob.secret());

    let mut sealed = alice_box.seal(b"payload").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    match bob_box.open(&sealed) {
        Err(Error::ErrCryptoOpen) => {}
        other => panic!("expected open failure, got {other:?}"),
    }
}

#[test]
fn open_rejects_truncated_input() {
    let alice = NodeKey::generate();
    let bob = NodeKey::generate();
    let bob_box = NodeBox::new(alice.public(), bob.secret());

    match bob_box.open(&[0u8; 10]) {
        Err(Error::ErrSealedTooShort { have }) => assert_eq!(have, 10),
        other => panic!("expected truncation error, got {other:?}"),
    }
}

#[test]
fn open_rejects_wrong_recipient() {
    let alice = NodeKey::generate();
    let bob = NodeKey::generate();
    let eve = NodeKey::generate();

    let alice_box = NodeBox::new(bob.public(), alice.secret());
    let eve_box = NodeBox::new(alice.public(), eve.secret());

    let sealed = alice_box.seal(b"for bob only").unwrap();
    assert!(eve_box.open(&sealed).is_err());
}
