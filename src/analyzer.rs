//! Fee ledger: who got paid what for one transaction.
//!
//! All amounts are wei in exact 256-bit integers. A missing receipt or
//! header never fails the analysis; the affected totals are left `None` and
//! the reason is recorded in `notes`.

use alloy::eips::eip4844::calc_blob_gasprice;
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::decoder::{Transaction, TransactionKind};
use crate::raw::{BlockHeader, Receipt};

pub const NOTE_NO_RECEIPT_GAS_USED: &str =
    "receipt unavailable, gas used is the gas limit (upper bound)";
pub const NOTE_DECLARED_PRICE: &str = "receipt unavailable, using declared gas price";
pub const NOTE_NO_EFFECTIVE_PRICE: &str =
    "effective gas price unknown: fee-market transaction without receipt";
pub const NOTE_RECEIPT_DECLARED_PRICE: &str =
    "receipt lacks effective gas price, using declared gas price";
pub const NOTE_RECEIPT_NO_PRICE: &str =
    "effective gas price unknown: receipt lacks effective gas price";
pub const NOTE_NO_HEADER: &str = "block header unavailable, base fee unknown";
pub const NOTE_NO_BASE_FEE: &str = "no base fee: pre-fee-market block";
pub const NOTE_NEGATIVE_PRIORITY: &str =
    "inconsistent input: base fee burnt exceeds total fee paid, priority fee reported as zero";
pub const NOTE_NO_BLOB_GAS_USED: &str = "blob gas used unknown";
pub const NOTE_DECLARED_BLOB_GAS: &str = "blob gas used unknown, using declared blob gas";
pub const NOTE_BLOB_PRICE_FROM_HEADER: &str = "blob gas price derived from header excess blob gas";
pub const NOTE_NO_BLOB_PRICE: &str = "blob gas price unavailable";
pub const NOTE_BLOCK_MISMATCH: &str = "receipt block does not match supplied header";
pub const NOTE_OVERFLOW: &str = "fee computation overflowed 256 bits";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentLabel {
    Base,
    Priority,
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasComponent {
    pub label: ComponentLabel,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasAnalysis {
    pub tx_hash: String,
    pub block_hash: Option<String>,
    pub block_number: Option<u64>,
    pub kind: TransactionKind,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub max_fee_per_blob_gas: Option<U256>,
    pub effective_gas_price: Option<U256>,
    /// Per-gas tip actually received by the proposer.
    pub effective_priority_fee_per_gas: Option<U256>,
    pub total_fee_paid: Option<U256>,
    pub base_fee_burnt: Option<U256>,
    pub priority_fee: Option<U256>,
    pub blob_gas_used: Option<u64>,
    pub blob_gas_price: Option<U256>,
    pub total_blob_fee_paid: Option<U256>,
    pub total_execution_and_blob: Option<U256>,
    pub components: Vec<GasComponent>,
    pub notes: Vec<String>,
}

#[derive(Default)]
struct Notes(Vec<String>);

impl Notes {
    fn push(&mut self, note: &str) {
        if !self.0.iter().any(|n| n == note) {
            self.0.push(note.to_string());
        }
    }

    fn mul(&mut self, a: Option<U256>, gas: Option<u64>) -> Option<U256> {
        let product = a?.checked_mul(U256::from(gas?));
        if product.is_none() {
            self.push(NOTE_OVERFLOW);
        }
        product
    }
}

/// Build the fee ledger for `tx`.
pub fn analyze(
    tx: &Transaction,
    receipt: Option<&Receipt>,
    header: Option<&BlockHeader>,
) -> GasAnalysis {
    let mut notes = Notes::default();

    let gas_used = match receipt {
        Some(receipt) => receipt.gas_used,
        None => {
            notes.push(NOTE_NO_RECEIPT_GAS_USED);
            tx.gas_limit
        }
    };

    let receipt_price = receipt.and_then(|r| r.effective_gas_price);
    let effective_gas_price = receipt_price.or(tx.effective_gas_price);
    // Pre-London receipts carry no effectiveGasPrice
    if receipt_price.is_none() {
        notes.push(match (receipt.is_some(), effective_gas_price.is_some()) {
            (false, true) => NOTE_DECLARED_PRICE,
            (false, false) => NOTE_NO_EFFECTIVE_PRICE,
            (true, true) => NOTE_RECEIPT_DECLARED_PRICE,
            (true, false) => NOTE_RECEIPT_NO_PRICE,
        });
    }

    let total_fee_paid = notes.mul(effective_gas_price, Some(gas_used));

    let base_fee_per_gas = match header {
        None => {
            notes.push(NOTE_NO_HEADER);
            None
        }
        Some(header) if header.base_fee_per_gas.is_none() => {
            notes.push(NOTE_NO_BASE_FEE);
            None
        }
        Some(header) => header.base_fee_per_gas,
    };
    let base_fee_burnt = notes.mul(base_fee_per_gas, Some(gas_used));

    let priority_fee = match (total_fee_paid, base_fee_burnt) {
        (Some(total), Some(burnt)) => Some(total.checked_sub(burnt).unwrap_or_else(|| {
            notes.push(NOTE_NEGATIVE_PRIORITY);
            U256::ZERO
        })),
        _ => None,
    };
    let effective_priority_fee_per_gas = match (effective_gas_price, base_fee_per_gas) {
        (Some(price), Some(base)) => Some(price.saturating_sub(base)),
        _ => None,
    };

    let (blob_gas_used, blob_gas_price, total_blob_fee_paid) = if tx.kind == TransactionKind::Blob
    {
        let used = match receipt.and_then(|r| r.blob_gas_used).or(tx.blob_gas_used) {
            Some(used) => Some(used),
            None => match tx.declared_blob_gas().filter(|gas| *gas > 0) {
                Some(declared) => {
                    notes.push(NOTE_DECLARED_BLOB_GAS);
                    Some(declared)
                }
                None => {
                    notes.push(NOTE_NO_BLOB_GAS_USED);
                    None
                }
            },
        };
        let price = blob_gas_price(receipt, header, &mut notes);
        (used, price, notes.mul(price, used))
    } else {
        (None, None, None)
    };

    let total_execution_and_blob = match (tx.kind, total_fee_paid, total_blob_fee_paid) {
        (TransactionKind::Blob, Some(execution), Some(blob)) => execution.checked_add(blob),
        (TransactionKind::Blob, _, _) => None,
        (_, execution, _) => execution,
    };

    let (block_hash, block_number) = block_identity(receipt, header, &mut notes);

    let components = [
        (ComponentLabel::Base, base_fee_burnt),
        (ComponentLabel::Priority, priority_fee),
        (ComponentLabel::Blob, total_blob_fee_paid),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|value| GasComponent { label, value }))
    .collect();

    GasAnalysis {
        tx_hash: tx.hash.clone(),
        block_hash,
        block_number,
        kind: tx.kind,
        gas_used,
        gas_limit: tx.gas_limit,
        base_fee_per_gas,
        gas_price: tx.gas_price,
        max_fee_per_gas: tx.max_fee_per_gas,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        max_fee_per_blob_gas: tx.max_fee_per_blob_gas,
        effective_gas_price,
        effective_priority_fee_per_gas,
        total_fee_paid,
        base_fee_burnt,
        priority_fee,
        blob_gas_used,
        blob_gas_price,
        total_blob_fee_paid,
        total_execution_and_blob,
        components,
        notes: notes.0,
    }
}

fn blob_gas_price(
    receipt: Option<&Receipt>,
    header: Option<&BlockHeader>,
    notes: &mut Notes,
) -> Option<U256> {
    if let Some(price) = receipt.and_then(|r| r.blob_gas_price) {
        return Some(price);
    }
    match header.and_then(|h| h.excess_blob_gas) {
        // Cancun update fraction
        Some(excess) => {
            notes.push(NOTE_BLOB_PRICE_FROM_HEADER);
            Some(U256::from(calc_blob_gasprice(excess)))
        }
        None => {
            notes.push(NOTE_NO_BLOB_PRICE);
            None
        }
    }
}

fn block_identity(
    receipt: Option<&Receipt>,
    header: Option<&BlockHeader>,
    notes: &mut Notes,
) -> (Option<String>, Option<u64>) {
    let receipt_hash = receipt.and_then(|r| r.block_hash.clone());
    let receipt_number = receipt.and_then(|r| r.block_number);
    let header_hash = header.and_then(|h| h.hash.clone());
    let header_number = header.and_then(|h| h.number);

    let hash_mismatch = matches!((&receipt_hash, &header_hash), (Some(a), Some(b)) if a != b);
    let number_mismatch = matches!((receipt_number, header_number), (Some(a), Some(b)) if a != b);
    if hash_mismatch || number_mismatch {
        notes.push(NOTE_BLOCK_MISMATCH);
    }

    (receipt_hash.or(header_hash), receipt_number.or(header_number))
}
