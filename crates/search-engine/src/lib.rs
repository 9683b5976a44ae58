//! Chain-traversal search: given a `(key, address)` token for the head of a
//! keyword's chain, walk it backwards through the index store and return one
//! [`FileDescriptor`] per node, newest first.
//!
//! The server sees which chain is being traversed but never the keyword
//! itself, and cannot predict the chain's length or future addresses — each
//! node's key and address were drawn independently at update time. A failed
//! decrypt or a malformed node payload ends the walk early rather than
//! failing the whole search; a chain that was built correctly never produces
//! either, so this is a defense against a corrupted or adversarial server,
//! not an expected path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use dsse_core::node::ChainLink;
use dsse_core::FileDescriptor;
use index_store::FsIndexStore;

/// Errors from opening or driving a search.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The index store itself failed (I/O, corrupt framing).
    #[error("index store: {0}")]
    IndexStore(#[from] index_store::Error),
    /// The start key was not valid hex or the wrong length.
    #[error("crypto: {0}")]
    Crypto(#[from] dsse_core::CryptoError),
}

/// Walk the encrypted chain starting at `(start_key, start_address)` and
/// return every file it names, newest node first.
///
/// Stops as soon as the index store reports [`index_store::Error::NotFound`]
/// for the current address (the chain's tail was already consumed) or a node
/// fails to decrypt or parse; in the latter two cases the nodes already
/// collected are still returned; none of these conditions arise on a chain
/// this workspace's own client built.
pub fn search(
    index: &FsIndexStore,
    start_key: &[u8; 32],
    start_address: &[u8; 32],
) -> Result<Vec<FileDescriptor>, Error> {
    let mut results = Vec::new();
    let mut current_key = *start_key;
    let mut current_address = *start_address;

    loop {
        let (nonce, ciphertext) = match index.get_node(&current_address) {
            Ok(v) => v,
            Err(index_store::Error::NotFound) => break,
            Err(e) => return Err(e.into()),
        };

        let plaintext = match dsse_core::crypto::aead_decrypt(&current_key, &nonce, &ciphertext) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(address = %hex::encode(current_address), error = %e, "chain node failed to decrypt, stopping traversal");
                break;
            }
        };

        let link = match ChainLink::from_bytes(&plaintext) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(address = %hex::encode(current_address), error = %e, "chain node failed to parse, stopping traversal");
                break;
            }
        };

        results.push(FileDescriptor::new(
            link.file_id().to_string(),
            link.original_name().to_string(),
            link.file_key().to_string(),
        ));

        match link.prev() {
            None => break,
            Some((prev_key_hex, prev_address_hex)) => {
                let prev_key = match dsse_core::crypto::key_from_hex(prev_key_hex) {
                    Ok(k) => k,
                    Err(e) => {
                        tracing::warn!(error = %e, "chain node's prev_key was not valid hex, stopping traversal");
                        break;
                    }
                };
                let prev_address = match dsse_core::crypto::address_from_hex(prev_address_hex) {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::warn!(error = %e, "chain node's prev_address was not valid hex, stopping traversal");
                        break;
                    }
                };
                current_key = prev_key;
                current_address = prev_address;
            }
        }
    }

    Ok(results)
}
