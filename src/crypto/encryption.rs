//! NaCl box encryption between two nodes.
//!
//! The shared key is precomputed once per peer pair. `seal` output is the
//! nonce followed by the ciphertext, so a sealed message is self-contained.

use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};

use crate::error::{Error, Result};

/// XSalsa20 nonce length in bytes.
const NONCE_SIZE: usize = 24;

pub struct NodeBox {
    inner: SalsaBox,
}

impl NodeBox {
    pub fn new(peer_public: &PublicKey, secret: &SecretKey) -> Self {
        Self {
            inner: SalsaBox::new(peer_public, secret),
        }
    }

    /// Encrypts and authenticates `msg` under a fresh nonce, returning
    /// `nonce || ciphertext`.
    pub fn seal(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let nonce = SalsaBox::generate_nonce(&mut OsRng);
        let ciphertext = self
            .inner
            .encrypt(&nonce, msg)
            .map_err(|_| Error::ErrCryptoSeal)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Opens a `seal` output, failing on truncation or forgery.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(Error::ErrSealedTooShort { have: sealed.len() });
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.inner
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::ErrCryptoOpen)
    }
}
