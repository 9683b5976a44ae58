//! The DSSE client: keeps a small persisted mapping from keyword to chain
//! head, and drives upload/search/download against a [`server::Server`].
//!
//! Every update draws a fresh, independently random key for its index node
//! (forward privacy): an adversary who observes one search token cannot
//! predict or link it to any update performed afterwards, because nothing
//! about the new key or address is derived from anything already observed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use dsse_core::crypto::{aead_decrypt, aead_encrypt, derive_address, key_from_hex, random_hex, random_key};
use dsse_core::node::ChainLink;
use dsse_core::FileDescriptor;
use server::Server;

/// Errors from client operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying filesystem failure (reading a file to upload, writing a download, state I/O).
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// State file failed to (de)serialize.
    #[error("client state: {0}")]
    State(#[from] serde_json::Error),
    /// A crypto-layer failure: bad hex, or AEAD authentication failure on decrypt.
    #[error("crypto: {0}")]
    Crypto(#[from] dsse_core::CryptoError),
    /// The server facade failed.
    #[error("server: {0}")]
    Server(#[from] server::Error),
}

type Head = (String, String);

/// The client's persisted `keyword -> chain head` mapping.
///
/// Every successful upload rewrites the state file via a temp-sibling +
/// atomic rename, so a crash mid-write leaves either the old or the new
/// state intact, never a torn file.
struct ClientState {
    path: PathBuf,
    map: Mutex<BTreeMap<String, Head>>,
}

impl ClientState {
    fn open(path: PathBuf) -> Result<Self, Error> {
        let map = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, map: Mutex::new(map) })
    }

    fn get(&self, keyword: &str) -> Option<Head> {
        self.map.lock().expect("client state lock poisoned").get(keyword).cloned()
    }

    fn set_and_save(&self, keyword: &str, head: Head) -> Result<(), Error> {
        let mut guard = self.map.lock().expect("client state lock poisoned");
        guard.insert(keyword.to_string(), head);
        self.save_locked(&guard)
    }

    fn save_locked(&self, map: &BTreeMap<String, Head>) -> Result<(), Error> {
        let tmp_path = self.path.with_extension(format!("{}.tmp", dsse_core::ids::next_monotonic_id()));
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(&serde_json::to_vec(map)?)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        let mut guard = self.map.lock().expect("client state lock poisoned");
        guard.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// A DSSE client bound to one persisted state file.
///
/// Per-keyword uploads are serialized through an internal lock around the
/// state's read-modify-write sequence, so two uploads for the same keyword
/// on the same client never race to read the same head and silently orphan
/// one update's index node.
pub struct Client {
    state: ClientState,
    upload_lock: Mutex<()>,
}

impl Client {
    /// Open (creating if necessary) a client with state persisted at `state_path`.
    pub fn open(state_path: PathBuf) -> Result<Self, Error> {
        Ok(Self { state: ClientState::open(state_path)?, upload_lock: Mutex::new(()) })
    }

    /// Encrypt and upload `file_path` under `keyword`, extending its chain.
    ///
    /// Returns the server-assigned `file_id` (hex) and wall-clock elapsed time.
    pub fn upload(&self, server: &Server, keyword: &str, file_path: &Path) -> Result<(String, f64), Error> {
        let _guard = self.upload_lock.lock().expect("upload lock poisoned");
        let start = Instant::now();

        let file_id = random_hex(16);
        let file_key = random_key();
        let bytes = fs::read(file_path)?;
        let (nonce_f, ct_f) = aead_encrypt(&file_key, &bytes, None)?;
        server.blob_store().put_blob(&file_id, &nonce_f, &file_key, &ct_f)?;

        let prev = self.state.get(keyword);
        let new_key = random_key();
        let new_address = derive_address(&new_key);

        let original_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string_lossy().into_owned());

        let link = ChainLink::new(file_id.clone(), original_name, hex::encode(*file_key), prev);
        let (nonce_n, ct_n) = aead_encrypt(&new_key, &link.to_bytes(), None)?;
        server.index_store().put_node(&new_address, &nonce_n, &ct_n)?;

        self.state.set_and_save(keyword, (hex::encode(*new_key), hex::encode(new_address)))?;

        Ok((file_id, start.elapsed().as_secs_f64()))
    }

    /// Search for every file uploaded under `keyword`.
    ///
    /// Returns `(None, elapsed)` if the keyword has never been uploaded to
    /// from this client, or `(Some(results), elapsed)` otherwise — an empty
    /// `results` is possible only if the server's chain was corrupted or
    /// truncated after upload.
    pub fn search(&self, server: &Server, keyword: &str) -> Result<(Option<Vec<FileDescriptor>>, f64), Error> {
        let start = Instant::now();
        let Some((key_hex, address_hex)) = self.state.get(keyword) else {
            return Ok((None, start.elapsed().as_secs_f64()));
        };
        let key = key_from_hex(&key_hex)?;
        let address = dsse_core::crypto::address_from_hex(&address_hex)?;
        let results = server.search(&key, &address)?;
        Ok((Some(results), start.elapsed().as_secs_f64()))
    }

    /// Fetch and decrypt `file_id`, writing the plaintext to `out_path`.
    ///
    /// Returns `Ok(false)` if the server has no blob for `file_id`. Returns
    /// `Err` on an authentication failure — the caller-supplied `file_key`
    /// is the only key ever tried; the server's own recorded copy is never
    /// used as a fallback.
    pub fn download(
        &self,
        server: &Server,
        file_id: &str,
        file_key_hex: &str,
        out_path: &Path,
    ) -> Result<bool, Error> {
        let blob = match server.blob_store().get_blob(file_id) {
            Ok(b) => b,
            Err(blob_store::Error::NotFound) => return Ok(false),
            Err(e) => return Err(server::Error::from(e).into()),
        };
        let nonce: [u8; 12] = hex::decode(&blob.nonce)
            .map_err(dsse_core::CryptoError::from)?
            .try_into()
            .map_err(|got: Vec<u8>| dsse_core::CryptoError::InvalidLength {
                what: "nonce",
                expected: 12,
                got: got.len(),
            })?;
        let file_key = key_from_hex(file_key_hex)?;
        let plain = aead_decrypt(&file_key, &nonce, &blob.bytes)?;
        fs::write(out_path, plain)?;
        Ok(true)
    }

    /// Discard all locally persisted state.
    pub fn clear_client(&self) -> Result<(), Error> {
        self.state.clear()
    }
}
