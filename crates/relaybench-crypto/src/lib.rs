//! Canonical encoding, signing and event ABI for relay transactions.

pub mod event;
pub mod relay_id;
pub mod signer;

pub use relay_id::{RELAY_TX_ID_ABI_TYPES, RELAY_TX_ID_FIELDS};
pub use signer::{LocalSigner, RelaySigner};
