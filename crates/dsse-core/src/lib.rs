//! Shared primitives for the DSSE core: AEAD/MAC crypto, the chain-node wire
//! schema, file descriptors, and small id helpers reused by every other crate
//! in the workspace.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
pub mod descriptor;
pub mod ids;
pub mod node;

pub use crypto::{Error as CryptoError, Key};
pub use descriptor::FileDescriptor;
pub use node::{ChainLink, NodeWire, SchemaError};

/// Version of the dsse-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
