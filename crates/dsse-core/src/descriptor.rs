//! File descriptor: the metadata a search result or an upload produces.

use serde::{Deserialize, Serialize};

/// Metadata describing one uploaded file, as returned by search and produced
/// at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// 128-bit globally unique file identifier, hex-encoded.
    pub file_id: String,
    /// The client's view of the filename (plaintext once decrypted).
    pub original_name: String,
    /// Hex-encoded 256-bit key used to decrypt this file's blob.
    pub file_key: String,
}

impl FileDescriptor {
    /// Construct a descriptor from its constituent parts.
    pub fn new(
        file_id: impl Into<String>,
        original_name: impl Into<String>,
        file_key: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            original_name: original_name.into(),
            file_key: file_key.into(),
        }
    }
}
