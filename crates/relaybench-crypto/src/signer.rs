//! secp256k1 signatures over relay transaction identifiers.
//!
//! The signed message is the 32 raw identifier bytes in EIP-191 personal
//! message form, which is what the relay recovers the sender from.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, Signature};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use relaybench_types::{Identifier, RelayError, Result, SignedTransactionRequest, TransactionRequest};

use crate::relay_id;

/// Anything that can sign relay identifiers for a fixed sender address.
pub trait RelaySigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_identifier(&self, identifier: &Identifier) -> Result<Signature>;
}

/// Signer backed by an in-process private key.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// Load a key from a hex string (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let inner = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| RelayError::Signing(format!("invalid private key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn random() -> Self {
        Self { inner: PrivateKeySigner::random() }
    }
}

impl RelaySigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn sign_identifier(&self, identifier: &Identifier) -> Result<Signature> {
        self.inner
            .sign_message_sync(identifier.as_slice())
            .map_err(|e| RelayError::Signing(e.to_string()))
    }
}

/// Sign an identifier and return the 65-byte `r || s || v` encoding.
pub fn sign(identifier: &Identifier, signer: &dyn RelaySigner) -> Result<Bytes> {
    let signature = signer.sign_identifier(identifier)?;
    Ok(Bytes::copy_from_slice(&signature.as_bytes()))
}

/// Compute the identifier of `request` and attach the sender's signature.
pub fn sign_request(
    request: TransactionRequest,
    signer: &dyn RelaySigner,
) -> Result<(Identifier, SignedTransactionRequest)> {
    if request.from != signer.address() {
        return Err(RelayError::Signing(format!(
            "request sender {} does not match signer {}",
            request.from,
            signer.address()
        )));
    }
    let identifier = relay_id::compute(&request)?;
    let signature = sign(&identifier, signer)?;
    Ok((identifier, SignedTransactionRequest { request, signature }))
}

/// Recover the address that signed `identifier`.
pub fn recover_signer(identifier: &Identifier, signature: &[u8]) -> Result<Address> {
    let signature = Signature::try_from(signature)
        .map_err(|e| RelayError::Signing(format!("malformed signature: {}", e)))?;
    signature
        .recover_address_from_msg(identifier.as_slice())
        .map_err(|e| RelayError::Signing(format!("recovery failed: {}", e)))
}

/// Check that `signature` over `identifier` was produced by `expected`.
pub fn verify_identifier_signature(
    identifier: &Identifier,
    signature: &[u8],
    expected: Address,
) -> bool {
    matches!(recover_signer(identifier, signature), Ok(address) if address == expected)
}
