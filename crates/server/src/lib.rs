//! The honest-but-curious server: owns the encrypted index, the encrypted
//! blob store, and exposes the search engine over them behind one handle.
//!
//! The server never sees a keyword or plaintext file content; it stores
//! whatever bytes it is handed at whatever address/file_id it is given and
//! answers chain-traversal queries over its own storage.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use blob_store::BlobStore;
use index_store::FsIndexStore;
use serde::{Deserialize, Serialize};

/// Errors surfaced by the server facade.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Index store failure.
    #[error("index store: {0}")]
    Index(#[from] index_store::Error),
    /// Blob store failure.
    #[error("blob store: {0}")]
    Blob(#[from] blob_store::Error),
    /// Search engine failure.
    #[error("search: {0}")]
    Search(#[from] search_engine::Error),
}

/// Storage statistics reported by [`Server::stats`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    /// Number of encrypted index nodes currently stored.
    pub index_entries: u64,
    /// Number of encrypted files currently stored.
    pub encrypted_files: u64,
    /// Size in bytes of the index store's on-disk entries.
    pub db_size_bytes: u64,
    /// Size in bytes of the blob store's metadata log plus blob bytes.
    pub storage_size_bytes: u64,
    /// `db_size_bytes + storage_size_bytes`.
    pub total_size_bytes: u64,
}

/// Root directory layout for a server's persistent state.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory; the index store and blob store each get a subdirectory.
    pub root: PathBuf,
}

impl Config {
    /// Build a config rooted at `root`.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Aggregates the index store, blob store, and search engine behind one
/// handle, as consumed by the client protocol operations.
pub struct Server {
    index: FsIndexStore,
    blobs: BlobStore,
}

impl Server {
    /// Open (creating if necessary) a server rooted at `cfg.root`.
    pub fn open(cfg: Config) -> Result<Self, Error> {
        let index = FsIndexStore::open(index_store::Config::with_root(cfg.root.clone()))?;
        let blobs = BlobStore::open(blob_store::Config::with_root(cfg.root))?;
        Ok(Self { index, blobs })
    }

    /// The index store, for client-side `put_node`/search callers.
    pub fn index_store(&self) -> &FsIndexStore {
        &self.index
    }

    /// The blob store, for client-side `put_blob`/`get_blob` callers.
    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Walk the encrypted chain starting at `(start_key, start_address)`.
    pub fn search(
        &self,
        start_key: &[u8; 32],
        start_address: &[u8; 32],
    ) -> Result<Vec<dsse_core::FileDescriptor>, Error> {
        Ok(search_engine::search(&self.index, start_key, start_address)?)
    }

    /// Storage statistics across the index store and blob store.
    pub fn stats(&self) -> Result<Stats, Error> {
        let index_entries = self.index.count_nodes()?;
        let db_size_bytes = self.index.size_bytes()?;
        let encrypted_files = self.blobs.count() as u64;
        let storage_size_bytes = self.blobs.storage_bytes()? + self.blobs.metadata_bytes();
        Ok(Stats {
            index_entries,
            encrypted_files,
            db_size_bytes,
            storage_size_bytes,
            total_size_bytes: db_size_bytes + storage_size_bytes,
        })
    }

    /// Drop all index entries and blobs.
    pub fn clear_all(&self) -> Result<(), Error> {
        let _span = tracing::info_span!("server.clear_all").entered();
        self.index.clear_all()?;
        self.blobs.clear_all()?;
        Ok(())
    }
}
