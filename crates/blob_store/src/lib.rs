//! Server blob store: a persistent `file_id -> (nonce, stored_file_key,
//! blob_location)` metadata table plus an opaque byte container per file.
//!
//! The bytes written here are already AEAD-encrypted by the client; this
//! crate never sees plaintext and performs no encryption of its own (unlike
//! an at-rest-encrypting content store, there is nothing left to protect
//! beyond what the client already sealed). Blob bytes are written with the
//! same temp-file + `fsync` + atomic-rename discipline as the index store,
//! sharded by `file_id` rather than by content digest — `file_id` is
//! server-assigned at upload time, so there is no dedup here, and two
//! uploads of byte-identical files under the same `file_id` scheme would
//! still get distinct ids and distinct rows.
//!
//! Metadata (`nonce`, `stored_file_key`, `storage_path`, `upload_time`) is
//! kept in a JSONL append log ([`event_log::JsonlEventLog`]) and replayed
//! into an in-memory map on [`BlobStore::open`], with last-write-wins per
//! `file_id` so that re-uploading under a colliding `file_id` is a
//! replacement, as the core specification requires.
//!
//! Recording `stored_file_key` alongside the blob is a known, deliberately
//! preserved weakening carried over from the source design: it destroys
//! blob confidentiality against a server that reads its own metadata table.
//! `download` never trusts it — only the key supplied by the caller is ever
//! used to decrypt.
//!
//! [`set_observer`] carries forward the teacher blob store's optional,
//! `OnceLock`-guarded metrics hook: a no-op unless an integration registers
//! one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};

use dsse_core::ids::now_ms;
use event_log::JsonlEventLog;
use serde::{Deserialize, Serialize};

/// Optional observability hooks (low-cardinality counters). By default these
/// are no-ops; integrations may register a global observer to mirror blob
/// traffic into metrics/traces without this crate depending on a particular
/// backend.
pub trait BlobStoreObserver: Send + Sync {
    /// Called with the ciphertext length on every successful `put_blob`.
    fn put_bytes(&self, _n: u64) {}
    /// Called with the ciphertext length on every successful `get_blob`.
    fn get_bytes(&self, _n: u64) {}
}

struct NoopObserver;
impl BlobStoreObserver for NoopObserver {}

static NOOP_OBSERVER: NoopObserver = NoopObserver;
static OBSERVER: OnceLock<&'static dyn BlobStoreObserver> = OnceLock::new();

/// Register a global observer for blob store metrics (optional).
///
/// Idempotent: only the first call takes effect, so repeated calls from
/// tests or multiple binaries in one process are harmless.
pub fn set_observer(observer: &'static dyn BlobStoreObserver) {
    let _ = OBSERVER.set(observer);
}

fn observer() -> &'static dyn BlobStoreObserver {
    OBSERVER.get().copied().unwrap_or(&NOOP_OBSERVER)
}

/// Errors from blob-store operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying filesystem failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// Metadata log failure (serialization or its own I/O).
    #[error("metadata log: {0}")]
    Metadata(#[from] event_log::EventLogError),
    /// No blob (metadata row, bytes, or both) found for the requested `file_id`.
    #[error("not found")]
    NotFound,
}

/// One metadata row: `file_id -> (nonce, stored_file_key, storage_path, upload_time)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaRow {
    file_id: String,
    nonce: String,
    stored_file_key: String,
    storage_path: String,
    upload_time_ms: u64,
}

/// Blob store configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory under which `blobs/` and the metadata log live.
    pub root: PathBuf,
}

impl Config {
    /// Build a config rooted at `root`.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Metadata plus opaque bytes for one stored blob, as returned by [`BlobStore::get_blob`].
pub struct StoredBlob {
    /// AEAD nonce the client used to encrypt this blob.
    pub nonce: String,
    /// The file-encryption key as recorded by the server (not a trust anchor for download).
    pub stored_file_key: String,
    /// The encrypted file bytes.
    pub bytes: Vec<u8>,
}

/// A durable `file_id -> blob` store with a replayable metadata log.
pub struct BlobStore {
    root: PathBuf,
    blobs_dir: PathBuf,
    log: JsonlEventLog,
    index: RwLock<HashMap<String, MetaRow>>,
}

impl BlobStore {
    /// Open (creating if necessary) a blob store rooted at `cfg.root`,
    /// replaying its metadata log into memory.
    pub fn open(cfg: Config) -> Result<Self, Error> {
        let root = cfg.root;
        let blobs_dir = root.join("blobs");
        fs::create_dir_all(&blobs_dir)?;
        let log = JsonlEventLog::open(root.join("blob_metadata.jsonl"))?;

        let mut index = HashMap::new();
        for rec in log.read_range::<MetaRow>(0, u64::MAX)? {
            index.insert(rec.payload.file_id.clone(), rec.payload);
        }

        Ok(Self { root, blobs_dir, log, index: RwLock::new(index) })
    }

    fn path_for(&self, file_id: &str) -> PathBuf {
        let (a, b) = if file_id.len() >= 4 {
            (&file_id[0..2], &file_id[2..4])
        } else {
            ("00", "00")
        };
        self.blobs_dir.join(a).join(b).join(format!("{file_id}.enc"))
    }

    /// Write `encrypted_bytes` for `file_id` and record its metadata row.
    /// Returns the `blob_location` (a path relative to the store root).
    ///
    /// A second `put_blob` for the same `file_id` replaces both the bytes
    /// and the metadata row.
    pub fn put_blob(
        &self,
        file_id: &str,
        nonce: &[u8],
        stored_file_key: &[u8],
        encrypted_bytes: &[u8],
    ) -> Result<String, Error> {
        let _span = tracing::debug_span!("blob_store.put_blob", file_id = %file_id).entered();
        let final_path = self.path_for(file_id);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = final_path.with_extension(format!("{}.tmp", dsse_core::ids::next_monotonic_id()));
        {
            let mut out = File::create(&tmp_path)?;
            out.write_all(encrypted_bytes)?;
            out.sync_all()?;
        }
        fs::rename(&tmp_path, &final_path)?;
        if let Some(parent) = final_path.parent() {
            if let Ok(dirf) = File::open(parent) {
                let _ = dirf.sync_all();
            }
        }

        let relative = final_path
            .strip_prefix(&self.root)
            .unwrap_or(&final_path)
            .to_string_lossy()
            .into_owned();

        let row = MetaRow {
            file_id: file_id.to_string(),
            nonce: hex::encode(nonce),
            stored_file_key: hex::encode(stored_file_key),
            storage_path: relative.clone(),
            upload_time_ms: now_ms(),
        };
        let id = dsse_core::ids::next_monotonic_id();
        self.log.append(id, row.upload_time_ms, &row)?;
        self.index.write().expect("blob index lock poisoned").insert(file_id.to_string(), row);
        observer().put_bytes(encrypted_bytes.len() as u64);

        Ok(relative)
    }

    /// Fetch the blob for `file_id`, or [`Error::NotFound`] if either the
    /// metadata row or the on-disk bytes are missing.
    pub fn get_blob(&self, file_id: &str) -> Result<StoredBlob, Error> {
        let _span = tracing::debug_span!("blob_store.get_blob", file_id = %file_id).entered();
        let row = {
            let index = self.index.read().expect("blob index lock poisoned");
            index.get(file_id).cloned()
        }
        .ok_or(Error::NotFound)?;

        let path = self.root.join(&row.storage_path);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(Error::Io(e)),
        };

        observer().get_bytes(bytes.len() as u64);
        Ok(StoredBlob { nonce: row.nonce, stored_file_key: row.stored_file_key, bytes })
    }

    /// Number of metadata rows currently tracked.
    pub fn count(&self) -> usize {
        self.index.read().expect("blob index lock poisoned").len()
    }

    /// Total bytes occupied by blob files on disk.
    pub fn storage_bytes(&self) -> Result<u64, Error> {
        let mut total = 0u64;
        walk(&self.blobs_dir, &mut |_path, len| total += len)?;
        Ok(total)
    }

    /// Size in bytes of the metadata log file on disk.
    pub fn metadata_bytes(&self) -> u64 {
        fs::metadata(self.root.join("blob_metadata.jsonl")).map(|m| m.len()).unwrap_or(0)
    }

    /// Drop every blob and metadata row, and the underlying byte container.
    pub fn clear_all(&self) -> Result<(), Error> {
        if self.blobs_dir.exists() {
            fs::remove_dir_all(&self.blobs_dir)?;
        }
        fs::create_dir_all(&self.blobs_dir)?;
        let log_path = self.root.join("blob_metadata.jsonl");
        if log_path.exists() {
            fs::remove_file(&log_path)?;
        }
        // Recreate an empty log so subsequent appends succeed.
        let _ = JsonlEventLog::open(&log_path)?;
        self.index.write().expect("blob index lock poisoned").clear();
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
        } else if path.extension().and_then(|e| e.to_str()) != Some("tmp") {
            f(&path, entry.metadata()?.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(Config::with_root(dir.path().to_path_buf())).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_roundtrips() {
        let (_dir, store) = store();
        store.put_blob("file1", b"nonce-bytes1", b"file-key-bytes-32", b"ciphertext").unwrap();
        let got = store.get_blob("file1").unwrap();
        assert_eq!(got.bytes, b"ciphertext");
        assert_eq!(got.nonce, hex::encode(b"nonce-bytes1"));
        assert_eq!(got.stored_file_key, hex::encode(b"file-key-bytes-32"));
    }

    #[test]
    fn missing_file_id_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.get_blob("nope"), Err(Error::NotFound)));
    }

    #[test]
    fn put_replaces_existing_entry() {
        let (_dir, store) = store();
        store.put_blob("dup", b"n1", b"k1", b"first").unwrap();
        store.put_blob("dup", b"n2", b"k2", b"second-payload").unwrap();
        let got = store.get_blob("dup").unwrap();
        assert_eq!(got.bytes, b"second-payload");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn reopen_replays_metadata_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = BlobStore::open(Config::with_root(dir.path().to_path_buf())).unwrap();
            store.put_blob("persisted", b"n", b"k", b"bytes-on-disk").unwrap();
        }
        let reopened = BlobStore::open(Config::with_root(dir.path().to_path_buf())).unwrap();
        assert_eq!(reopened.get_blob("persisted").unwrap().bytes, b"bytes-on-disk");
        assert_eq!(reopened.count(), 1);
    }

    #[test]
    fn clear_all_removes_everything() {
        let (_dir, store) = store();
        store.put_blob("a", b"n", b"k", b"x").unwrap();
        store.clear_all().unwrap();
        assert_eq!(store.count(), 0);
        assert!(matches!(store.get_blob("a"), Err(Error::NotFound)));
        assert_eq!(store.storage_bytes().unwrap(), 0);
    }

    #[test]
    fn empty_blob_is_representable() {
        let (_dir, store) = store();
        store.put_blob("empty", b"n", b"k", b"").unwrap();
        assert_eq!(store.get_blob("empty").unwrap().bytes, Vec::<u8>::new());
    }

    struct CountingObserver {
        puts: std::sync::atomic::AtomicU64,
        gets: std::sync::atomic::AtomicU64,
    }

    impl BlobStoreObserver for CountingObserver {
        fn put_bytes(&self, n: u64) {
            self.puts.fetch_add(n, std::sync::atomic::Ordering::Relaxed);
        }
        fn get_bytes(&self, n: u64) {
            self.gets.fetch_add(n, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[test]
    fn registered_observer_sees_put_and_get_byte_counts() {
        static OBS: CountingObserver =
            CountingObserver { puts: std::sync::atomic::AtomicU64::new(0), gets: std::sync::atomic::AtomicU64::new(0) };
        set_observer(&OBS);

        let (_dir, store) = store();
        store.put_blob("obs", b"n", b"k", b"12345").unwrap();
        store.get_blob("obs").unwrap();

        assert!(OBS.puts.load(std::sync::atomic::Ordering::Relaxed) >= 5);
        assert!(OBS.gets.load(std::sync::atomic::Ordering::Relaxed) >= 5);
    }
}
