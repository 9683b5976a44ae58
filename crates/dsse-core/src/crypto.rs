//! AEAD encryption and keyed MAC over AES-256-GCM / HMAC-SHA256.
//!
//! Every key handed out by this module (`random_key`) is independently
//! uniform and never reused across updates; that independence is what the
//! forward-privacy argument in the core specification rests on.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length in bytes of an AES-256-GCM / chain key.
pub const KEY_LEN: usize = 32;
/// Length in bytes of an AES-GCM nonce.
pub const NONCE_LEN: usize = 12;
/// Domain-separation label used to derive a node's storage address from its key.
pub const ADDRESS_LABEL: &[u8] = b"address";

/// A 32-byte symmetric key, zeroized on drop.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

/// Crypto-layer failures. Never carries key material or plaintext in `Display`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// AEAD authentication failed (tampered or wrong key).
    #[error("authentication failed: ciphertext tag mismatch")]
    Auth,
    /// Nonce or key had the wrong length for the primitive in use.
    #[error("invalid length for {what}: expected {expected}, got {got}")]
    InvalidLength {
        /// Which value was malformed.
        what: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Byte length actually supplied.
        got: usize,
    },
    /// Hex decoding failed.
    #[error("invalid hex encoding")]
    Hex(#[from] hex::FromHexError),
}

/// Generate a fresh, uniformly random 256-bit key from the OS CSPRNG.
///
/// Used for both file-encryption keys and per-update chain-node keys. Callers
/// must never derive this value from a keyword, a previous key, or any other
/// predictable source — doing so would break forward privacy.
pub fn random_key() -> Key {
    let mut bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    Zeroizing::new(bytes)
}

/// Generate `n` random bytes, hex-encoded. Used for `file_id` generation.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute HMAC-SHA256 over `label` keyed by `key`.
pub fn mac(key: &[u8; KEY_LEN], label: &[u8]) -> [u8; 32] {
    let mut h = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    h.update(label);
    h.finalize().into_bytes().into()
}

/// Derive a node's storage address from its key: `mac(key, "address")`.
///
/// Pseudorandom from the server's point of view; reveals nothing about the
/// key or the keyword the node belongs to.
pub fn derive_address(key: &[u8; KEY_LEN]) -> [u8; 32] {
    mac(key, ADDRESS_LABEL)
}

/// Authenticated-encrypt `plaintext` under `key`, with no associated data.
///
/// If `nonce` is `None` a fresh random 96-bit nonce is drawn. Because every
/// key here is freshly random and used exactly once, a random nonce cannot
/// collide with a prior nonce under the same key in practice.
pub fn aead_encrypt(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    nonce: Option<[u8; NONCE_LEN]>,
) -> Result<([u8; NONCE_LEN], Vec<u8>), Error> {
    let cipher = Aes256Gcm::new_from_slice(key).expect("32-byte key accepted by AES-256-GCM");
    let nonce_bytes = nonce.unwrap_or_else(|| {
        let mut n = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut n);
        n
    });
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::Auth)?;
    Ok((nonce_bytes, ciphertext))
}

/// Authenticated-decrypt `ciphertext` under `key` and `nonce`.
///
/// Fails with [`Error::Auth`] on tag mismatch, truncation, or any other
/// AEAD-level integrity failure. Never panics on adversarial input.
pub fn aead_decrypt(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Aes256Gcm::new_from_slice(key).expect("32-byte key accepted by AES-256-GCM");
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Auth)
}

/// Parse a hex string into a fixed-size key, rejecting the wrong length.
pub fn key_from_hex(s: &str) -> Result<[u8; KEY_LEN], Error> {
    let bytes = hex::decode(s)?;
    bytes.try_into().map_err(|b: Vec<u8>| Error::InvalidLength {
        what: "key",
        expected: KEY_LEN,
        got: b.len(),
    })
}

/// Parse a hex string into a fixed-size 256-bit address, rejecting the wrong length.
pub fn address_from_hex(s: &str) -> Result<[u8; 32], Error> {
    let bytes = hex::decode(s)?;
    bytes.try_into().map_err(|b: Vec<u8>| Error::InvalidLength {
        what: "address",
        expected: 32,
        got: b.len(),
    })
}
