pub mod encryption;
pub mod keys;

#[cfg(test)]
mod encryption_test;
#[cfg(test)]
mod keys_test;

pub use self::encryption::NodeBox;
pub use self::keys::{decode_key, encode_key, NodeKey, KEY_SIZE};
