use alloy::consensus::{transaction::SignerRecoverable, TxEnvelope};
use alloy::primitives::Address;
use tracing::warn;

use crate::codec;
use crate::error::{Error, Result};
use crate::raw::RawTransaction;

/// Recover the sending address from the transaction's signature.
///
/// The signing hash binds the chain ID: EIP-155 for legacy transactions,
/// the typed payload for everything else.
pub fn recover_sender(raw: &RawTransaction) -> Result<Address> {
    let value = serde_json::to_value(raw).map_err(|e| Error::Signature(e.to_string()))?;
    let envelope: TxEnvelope = serde_json::from_value(value)
        .map_err(|e| Error::Signature(format!("malformed signed transaction: {}", e)))?;

    let sender = envelope
        .recover_signer()
        .map_err(|e| Error::Signature(e.to_string()))?;

    if let Some(reported) = raw.from.as_deref() {
        if !reported.eq_ignore_ascii_case(&codec::to_hex(sender)) {
            warn!(%sender, reported, "node-reported sender differs from recovered sender");
        }
    }

    Ok(sender)
}
