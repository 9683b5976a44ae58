//! The per-keyword chain node: the plaintext payload encrypted under a
//! node's unique key and stored at its derived address.
//!
//! [`NodeWire`] is the external, self-describing wire shape named in the
//! core specification (`file_id`, `original_name`, `file_key`, `old_key`,
//! `old_address`, with the last two both present or both absent).
//! [`ChainLink`] is the typed domain model: a sum type that makes "both
//! present or both absent" true by construction instead of by a runtime
//! check on two independently-nullable fields.

use serde::{Deserialize, Serialize};

/// The wire-format encoding of a chain node, matching the external interface
/// named in the core specification exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWire {
    /// Hex-encoded file id this node announces.
    pub file_id: String,
    /// Plaintext filename.
    pub original_name: String,
    /// Hex-encoded file-decryption key.
    pub file_key: String,
    /// Hex-encoded key of the previous chain node, or `null` for the tail.
    pub old_key: Option<String>,
    /// Hex-encoded address of the previous chain node, or `null` for the tail.
    pub old_address: Option<String>,
}

/// A decrypted chain node failed to parse, or its wire form violated the
/// present-together invariant on `old_key`/`old_address`.
#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    /// `old_key` and `old_address` must both be present or both be absent.
    #[error("old_key and old_address must both be present or both be absent")]
    InconsistentPrevPointer,
    /// The decrypted bytes did not parse as the node wire schema.
    #[error("malformed node payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One node in a keyword's encrypted chain: either the tail (`Head`, no
/// predecessor) or an interior/head-of-a-longer-chain link (`Linked`,
/// pointing at the previous node's key and address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainLink {
    /// The oldest node in the chain: no predecessor.
    Head {
        /// File id this node announces.
        file_id: String,
        /// Plaintext filename.
        original_name: String,
        /// Hex-encoded file-decryption key.
        file_key: String,
    },
    /// A node with a predecessor still reachable in the chain.
    Linked {
        /// File id this node announces.
        file_id: String,
        /// Plaintext filename.
        original_name: String,
        /// Hex-encoded file-decryption key.
        file_key: String,
        /// Hex-encoded key of the previous node.
        prev_key: String,
        /// Hex-encoded address of the previous node.
        prev_address: String,
    },
}

impl ChainLink {
    /// Build a node pointing at a previous head, or a tail node if `prev` is `None`.
    pub fn new(
        file_id: impl Into<String>,
        original_name: impl Into<String>,
        file_key: impl Into<String>,
        prev: Option<(String, String)>,
    ) -> Self {
        let (file_id, original_name, file_key) = (file_id.into(), original_name.into(), file_key.into());
        match prev {
            None => ChainLink::Head { file_id, original_name, file_key },
            Some((prev_key, prev_address)) => {
                ChainLink::Linked { file_id, original_name, file_key, prev_key, prev_address }
            }
        }
    }

    /// The file id this node announces.
    pub fn file_id(&self) -> &str {
        match self {
            ChainLink::Head { file_id, .. } | ChainLink::Linked { file_id, .. } => file_id,
        }
    }

    /// The plaintext filename carried by this node.
    pub fn original_name(&self) -> &str {
        match self {
            ChainLink::Head { original_name, .. } | ChainLink::Linked { original_name, .. } => original_name,
        }
    }

    /// The hex-encoded file key carried by this node.
    pub fn file_key(&self) -> &str {
        match self {
            ChainLink::Head { file_key, .. } | ChainLink::Linked { file_key, .. } => file_key,
        }
    }

    /// The predecessor's `(key_hex, address_hex)`, if this node is not the tail.
    pub fn prev(&self) -> Option<(&str, &str)> {
        match self {
            ChainLink::Head { .. } => None,
            ChainLink::Linked { prev_key, prev_address, .. } => Some((prev_key, prev_address)),
        }
    }

    /// Serialize to the deterministic wire encoding that gets AEAD-encrypted.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&NodeWire::from(self)).expect("NodeWire serialization cannot fail")
    }

    /// Parse a decrypted node payload, enforcing the present-together invariant.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let wire: NodeWire = serde_json::from_slice(bytes)?;
        wire.try_into()
    }
}

impl From<&ChainLink> for NodeWire {
    fn from(link: &ChainLink) -> Self {
        match link {
            ChainLink::Head { file_id, original_name, file_key } => NodeWire {
                file_id: file_id.clone(),
                original_name: original_name.clone(),
                file_key: file_key.clone(),
                old_key: None,
                old_address: None,
            },
            ChainLink::Linked { file_id, original_name, file_key, prev_key, prev_address } => NodeWire {
                file_id: file_id.clone(),
                original_name: original_name.clone(),
                file_key: file_key.clone(),
                old_key: Some(prev_key.clone()),
                old_address: Some(prev_address.clone()),
            },
        }
    }
}

impl TryFrom<NodeWire> for ChainLink {
    type Error = SchemaError;

    fn try_from(wire: NodeWire) -> Result<Self, Self::Error> {
        match (wire.old_key, wire.old_address) {
            (None, None) => Ok(ChainLink::Head {
                file_id: wire.file_id,
                original_name: wire.original_name,
                file_key: wire.file_key,
            }),
            (Some(prev_key), Some(prev_address)) => Ok(ChainLink::Linked {
                file_id: wire.file_id,
                original_name: wire.original_name,
                file_key: wire.file_key,
                prev_key,
                prev_address,
            }),
            _ => Err(SchemaError::InconsistentPrevPointer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_roundtrips_through_wire() {
        let link = ChainLink::new("f1", "plans.txt", "ab".repeat(32), None);
        let bytes = link.to_bytes();
        let parsed = ChainLink::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, link);
        assert!(parsed.prev().is_none());
    }

    #[test]
    fn linked_roundtrips_through_wire() {
        let link = ChainLink::new(
            "f2",
            "report.txt",
            "cd".repeat(32),
            Some(("11".repeat(32), "22".repeat(32))),
        );
        let bytes = link.to_bytes();
        let parsed = ChainLink::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, link);
        assert_eq!(parsed.prev(), Some(("11".repeat(32).as_str(), "22".repeat(32).as_str())));
    }

    #[test]
    fn wire_shape_matches_spec_field_names() {
        let link = ChainLink::new("f1", "x.txt", "ff".repeat(32), None);
        let v: serde_json::Value = serde_json::from_slice(&link.to_bytes()).unwrap();
        let obj = v.as_object().unwrap();
        assert!(obj.contains_key("file_id"));
        assert!(obj.contains_key("original_name"));
        assert!(obj.contains_key("file_key"));
        assert!(obj.get("old_key").unwrap().is_null());
        assert!(obj.get("old_address").unwrap().is_null());
    }

    #[test]
    fn inconsistent_prev_pointer_rejected() {
        let wire = NodeWire {
            file_id: "f1".into(),
            original_name: "x".into(),
            file_key: "k".into(),
            old_key: Some("a".into()),
            old_address: None,
        };
        assert!(matches!(ChainLink::try_from(wire), Err(SchemaError::InconsistentPrevPointer)));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error_not_a_panic() {
        assert!(matches!(ChainLink::from_bytes(b"not json"), Err(SchemaError::Parse(_))));
    }
}
