//! Node identity keys.
//!
//! A node is identified by a 32-byte NaCl box keypair. The public key travels
//! in the `nodePub` wire field as URL-safe base64: the standard alphabet with
//! `+` -> `-`, `/` -> `_` and the padding stripped.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const KEY_SIZE: usize = 32;

pub struct NodeKey {
    secret: SecretKey,
    public: PublicKey,
}

#[derive(Serialize, Deserialize)]
struct NodeKeyJson {
    #[serde(rename = "pub")]
    public: String,
    #[serde(rename = "priv")]
    secret: String,
}

impl NodeKey {
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// URL-safe base64 of the public key, as carried in `nodePub`.
    pub fn url_base64(&self) -> String {
        encode_key(&self.public)
    }

    pub fn to_json(&self) -> Result<String> {
        let key = NodeKeyJson {
            public: hex::encode(self.public.as_bytes()),
            secret: hex::encode(self.secret.to_bytes()),
        };
        Ok(serde_json::to_string(&key)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let key: NodeKeyJson = serde_json::from_str(data)?;
        let secret = SecretKey::from(decode_hex_key(&key.secret)?);
        let public = PublicKey::from(decode_hex_key(&key.public)?);
        Ok(Self { secret, public })
    }

    /// Loads the key file at `path`, generating and persisting a fresh key
    /// (owner-only permissions) if none exists.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_json(&std::fs::read_to_string(path)?);
        }

        let key = Self::generate();
        std::fs::write(path, key.to_json()?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(key)
    }
}

/// Encodes a public key as URL-safe base64 without padding.
pub fn encode_key(key: &PublicKey) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Decodes a URL-safe base64 public key, rejecting anything that does not
/// decode to exactly 32 bytes.
pub fn decode_key(encoded: &str) -> Result<PublicKey> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded)?;
    let bytes: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| Error::ErrKeyLength { have: bytes.len() })?;
    Ok(PublicKey::from(bytes))
}

fn decode_hex_key(encoded: &str) -> Result<[u8; KEY_SIZE]> {
    let bytes = hex::decode(encoded)?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| Error::ErrKeyLength { have: bytes.len() })
}
