//! API key resolution for Atelier
//!
//! Decides which key, and therefore which provider, a generation call uses:
//! the bundled default or a key the signed-in user saved. User keys live in
//! a remote store reached through [`KeyStore`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod rpc;
mod session;
mod store;

pub use error::KeyError;
pub use rpc::RpcKeyStore;
pub use session::{ApiKeySource, KeySession, ResolvedKey};
pub use store::{KeyStore, MemoryKeyStore, StoredKey};
