//! Server index store: a persistent `address -> (nonce, ciphertext)` map for
//! encrypted chain nodes.
//!
//! Layout follows the sharded-directory, write-temp/fsync/rename discipline
//! used throughout this workspace for durable point writes, generalized from
//! content-addressed digests (teacher's blob store) to server-assigned
//! addresses: there is no deduplication here, since two distinct chain nodes
//! legitimately produce distinct ciphertexts even when their addresses
//! happen to coincide (which, by the birthday bound on a 256-bit MAC image,
//! essentially never happens).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use dsse_core::ids::next_monotonic_id;

const NONCE_LEN: usize = 12;

/// Errors from index-store operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// No entry stored at the requested address.
    #[error("not found")]
    NotFound,
    /// A stored entry's on-disk framing was corrupt (truncated header or length mismatch).
    #[error("corrupt index entry")]
    Integrity,
}

/// Index store configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory under which the sharded `index/` tree lives.
    pub root: PathBuf,
}

impl Config {
    /// Build a config rooted at `root`.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

/// A durable, thread-safe `address -> (nonce, ciphertext)` store.
///
/// Safe to share across threads: every mutation goes through a temp-file +
/// atomic-rename sequence, so concurrent `put_node` calls at distinct
/// addresses never interleave, and `get_node` always observes a complete
/// write or none at all.
pub struct FsIndexStore {
    root: PathBuf,
}

impl FsIndexStore {
    /// Open (creating if necessary) an index store rooted at `cfg.root`.
    pub fn open(cfg: Config) -> Result<Self, Error> {
        let root = cfg.root.join("index");
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, address_hex: &str) -> PathBuf {
        let (a, b) = (&address_hex[0..2], &address_hex[2..4]);
        self.root.join(a).join(b).join(address_hex)
    }

    /// Idempotent upsert: stores `(nonce, ciphertext)` at `address`, overwriting
    /// any prior entry. Durable before returning.
    pub fn put_node(&self, address: &[u8; 32], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<(), Error> {
        let address_hex = hex::encode(address);
        let final_path = self.path_for(&address_hex);
        let _span = tracing::debug_span!("index_store.put_node", address = %address_hex).entered();
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = final_path.with_extension(format!("{}.tmp", next_monotonic_id()));
        {
            let mut out = File::create(&tmp_path)?;
            out.write_all(nonce)?;
            out.write_all(&(ciphertext.len() as u32).to_be_bytes())?;
            out.write_all(ciphertext)?;
            out.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        if let Some(parent) = final_path.parent() {
            if let Ok(dirf) = File::open(parent) {
                let _ = dirf.sync_all();
            }
        }
        Ok(())
    }

    /// Fetch `(nonce, ciphertext)` stored at `address`, or [`Error::NotFound`].
    pub fn get_node(&self, address: &[u8; 32]) -> Result<([u8; NONCE_LEN], Vec<u8>), Error> {
        let address_hex = hex::encode(address);
        let path = self.path_for(&address_hex);
        let mut f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut nonce = [0u8; NONCE_LEN];
        f.read_exact(&mut nonce).map_err(|_| Error::Integrity)?;
        let mut len_buf = [0u8; 4];
        f.read_exact(&mut len_buf).map_err(|_| Error::Integrity)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut ciphertext = vec![0u8; len];
        f.read_exact(&mut ciphertext).map_err(|_| Error::Integrity)?;
        Ok((nonce, ciphertext))
    }

    /// Total number of entries currently stored.
    pub fn count_nodes(&self) -> Result<u64, Error> {
        let mut count = 0u64;
        walk(&self.root, &mut |_path, _len| count += 1)?;
        Ok(count)
    }

    /// Total bytes occupied by stored entries (file contents only).
    pub fn size_bytes(&self) -> Result<u64, Error> {
        let mut total = 0u64;
        walk(&self.root, &mut |_path, len| total += len)?;
        Ok(total)
    }

    /// Remove every stored entry. Used by `server_clear_all`.
    pub fn clear_all(&self) -> Result<(), Error> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
            fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}

fn walk(dir: &Path, f: &mut impl FnMut(&Path, u64)) -> io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, f)?;
        } else if path.extension().and_then(|e| e.to_str()).map(|e| e.ends_with("tmp")) != Some(true) {
            let len = entry.metadata()?.len();
            f(&path, len);
        }
    }
    Ok(())
}
