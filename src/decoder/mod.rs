use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{self, DecodeError};
use crate::raw::{RawTransaction, Receipt};
use crate::utils::estimate_intrinsic_gas;

pub mod access_list;
pub mod sender;

pub use access_list::{normalize_access_list, AccessListEntry};
pub use sender::recover_sender;

/// Blob gas consumed by a single blob (EIP-4844).
pub const GAS_PER_BLOB: u64 = 131_072;

/// Transaction envelope generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Legacy,
    AccessList,
    DynamicFee,
    Blob,
}

impl TransactionKind {
    /// Classify a wire type tag. A missing tag is an untyped legacy
    /// transaction; any tag outside 0..=3 is rejected.
    pub fn from_type_tag(tag: Option<&str>) -> Result<Self, DecodeError> {
        let Some(tag) = tag else {
            return Ok(Self::Legacy);
        };
        let value = codec::parse_u64("type", tag)
            .map_err(|_| DecodeError::UnrecognizedType(tag.to_string()))?;
        u8::try_from(value)
            .ok()
            .and_then(|byte| Self::try_from(byte).ok())
            .ok_or_else(|| DecodeError::UnrecognizedType(tag.to_string()))
    }

    pub fn has_access_list(self) -> bool {
        !matches!(self, Self::Legacy)
    }
}

impl TryFrom<u8> for TransactionKind {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::AccessList),
            2 => Ok(Self::DynamicFee),
            3 => Ok(Self::Blob),
            other => Err(DecodeError::UnrecognizedType(format!("{:#x}", other))),
        }
    }
}

/// A decoded transaction.
///
/// Exactly the fee fields implied by `kind` are set: `gas_price` for
/// legacy, the fee-cap/tip-cap pair for everything else, and the blob
/// fields only for blob transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creation.
    pub to: Option<String>,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub kind: TransactionKind,
    pub chain_id: U256,
    pub access_list: Vec<AccessListEntry>,
    pub input: Bytes,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub effective_gas_price: Option<U256>,
    pub blob_gas_used: Option<u64>,
    pub max_fee_per_blob_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blob_versioned_hashes: Vec<String>,
    pub estimated_intrinsic_gas: u64,
}

impl Transaction {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Blob gas declared by the transaction, known before inclusion.
    pub fn declared_blob_gas(&self) -> Option<u64> {
        (self.kind == TransactionKind::Blob)
            .then(|| self.blob_versioned_hashes.len() as u64 * GAS_PER_BLOB)
    }
}

struct FeeFields {
    gas_price: Option<U256>,
    max_fee_per_gas: Option<U256>,
    max_priority_fee_per_gas: Option<U256>,
}

fn fee_fields(kind: TransactionKind, raw: &RawTransaction) -> Result<FeeFields, DecodeError> {
    let quantity = |field: &'static str, value: Option<&str>| -> Result<U256, DecodeError> {
        codec::parse_quantity(field, codec::required(field, value)?)
    };

    Ok(match kind {
        TransactionKind::Legacy => FeeFields {
            gas_price: Some(quantity("gasPrice", raw.gas_price.as_deref())?),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        },
        // An access-list transaction prices gas with a single gasPrice, which is
        // both its fee cap and its tip cap.
        TransactionKind::AccessList => {
            let max_fee = raw.max_fee_per_gas.as_deref().or(raw.gas_price.as_deref());
            let tip = raw
                .max_priority_fee_per_gas
                .as_deref()
                .or(raw.gas_price.as_deref());
            FeeFields {
                gas_price: None,
                max_fee_per_gas: Some(quantity("maxFeePerGas", max_fee)?),
                max_priority_fee_per_gas: Some(quantity("maxPriorityFeePerGas", tip)?),
            }
        }
        TransactionKind::DynamicFee | TransactionKind::Blob => FeeFields {
            gas_price: None,
            max_fee_per_gas: Some(quantity("maxFeePerGas", raw.max_fee_per_gas.as_deref())?),
            max_priority_fee_per_gas: Some(quantity(
                "maxPriorityFeePerGas",
                raw.max_priority_fee_per_gas.as_deref(),
            )?),
        },
    })
}

/// Build a [`Transaction`] from the node's object, its receipt when the
/// transaction has been included, and the recovered sender.
pub fn decode(
    raw: Option<&RawTransaction>,
    receipt: Option<&Receipt>,
    sender: Address,
) -> Result<Transaction, DecodeError> {
    let raw = raw.ok_or(DecodeError::MissingTransaction)?;
    let kind = TransactionKind::from_type_tag(raw.tx_type.as_deref())?;

    let hash = codec::hash("hash", codec::required("hash", raw.hash.as_deref())?)?;
    let to = match raw.to.as_deref() {
        None | Some("") | Some("0x") => None,
        Some(to) => Some(codec::address("to", to)?),
    };
    let chain_id = codec::opt_quantity("chainId", raw.chain_id.as_deref())?.unwrap_or_default();
    // Untyped transactions carry no access list, whatever the node echoes
    let access_list = if kind.has_access_list() {
        normalize_access_list(raw.access_list.as_deref())?
    } else {
        Vec::new()
    };
    let input = Bytes::from(codec::parse_bytes("input", &raw.input)?);

    let fees = fee_fields(kind, raw)?;

    let effective_gas_price = receipt
        .and_then(|r| r.effective_gas_price)
        .or(match kind {
            TransactionKind::Legacy => fees.gas_price,
            // only knowable once included
            _ => None,
        });

    let (blob_gas_used, max_fee_per_blob_gas, blob_versioned_hashes) =
        if kind == TransactionKind::Blob {
            let cap = codec::parse_quantity(
                "maxFeePerBlobGas",
                codec::required("maxFeePerBlobGas", raw.max_fee_per_blob_gas.as_deref())?,
            )?;
            let hashes = raw
                .blob_versioned_hashes
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|h| codec::hash("blobVersionedHashes", h))
                .collect::<Result<Vec<_>, _>>()?;
            (receipt.and_then(|r| r.blob_gas_used), Some(cap), hashes)
        } else {
            (None, None, Vec::new())
        };

    // Last: depends on the final input and access list.
    let estimated_intrinsic_gas = estimate_intrinsic_gas(kind, &input, &access_list, to.is_none());

    Ok(Transaction {
        hash,
        from: codec::to_hex(sender),
        to,
        nonce: codec::parse_u64("nonce", &raw.nonce)?,
        value: codec::parse_quantity("value", &raw.value)?,
        gas_limit: codec::parse_u64("gas", &raw.gas)?,
        kind,
        chain_id,
        access_list,
        input,
        gas_price: fees.gas_price,
        max_fee_per_gas: fees.max_fee_per_gas,
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        effective_gas_price,
        blob_gas_used,
        max_fee_per_blob_gas,
        blob_versioned_hashes,
        estimated_intrinsic_gas,
    })
}

/// Decode `raw` and recover its sender.
///
/// Shape problems surface as decode errors before the signature is looked
/// at; only a well-formed transaction reaches recovery.
pub fn decode_signed(
    raw: &RawTransaction,
    receipt: Option<&Receipt>,
) -> error::Result<Transaction> {
    let mut tx = decode(Some(raw), receipt, Address::ZERO)?;
    tx.from = codec::to_hex(recover_sender(raw)?);
    Ok(tx)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::raw::RawAccessListItem;
    use alloy::primitives::address;
    use pretty_assertions::assert_eq;

    const SENDER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    // Test helper to create a basic transfer
    pub(crate) fn legacy_transfer() -> RawTransaction {
        RawTransaction {
            hash: Some(format!("0x{}", "ab".repeat(32))),
            tx_type: Some("0x0".to_string()),
            nonce: "0x1".to_string(),
            to: Some("0x1234567890123456789012345678901234567890".to_string()),
            value: "0xde0b6b3a7640000".to_string(), // 1 ETH in wei
            gas: "0x5208".to_string(),
            gas_price: Some("0x4a817c800".to_string()), // 20 gwei
            chain_id: Some("0x1".to_string()),
            input: "0x".to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn dynamic_fee_call() -> RawTransaction {
        RawTransaction {
            tx_type: Some("0x2".to_string()),
            gas: "0xc350".to_string(),
            gas_price: Some("0x2cb417800".to_string()),
            max_fee_per_gas: Some("0x6fc23ac00".to_string()), // 30 gwei
            max_priority_fee_per_gas: Some("0x77359400".to_string()), // 2 gwei
            access_list: Some(vec![RawAccessListItem {
                address: "0x1234567890123456789012345678901234567890".to_string(),
                storage_keys: vec![format!("0x{}", "00".repeat(32))],
            }]),
            input: "0xa9059cbb00".to_string(),
            ..legacy_transfer()
        }
    }

    fn receipt(effective_gas_price: u64) -> Receipt {
        Receipt {
            transaction_hash: None,
            success: Some(true),
            gas_used: 21_000,
            effective_gas_price: Some(U256::from(effective_gas_price)),
            blob_gas_used: Some(131_072),
            blob_gas_price: None,
            block_hash: None,
            block_number: Some(1),
            transaction_index: Some(0),
            contract_address: None,
        }
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(
            TransactionKind::from_type_tag(None).unwrap(),
            TransactionKind::Legacy
        );
        assert_eq!(
            TransactionKind::from_type_tag(Some("0x3")).unwrap(),
            TransactionKind::Blob
        );
        assert_eq!(
            TransactionKind::from_type_tag(Some("0x4")).unwrap_err(),
            DecodeError::UnrecognizedType("0x4".to_string())
        );
        assert_eq!(
            TransactionKind::from_type_tag(Some("0x7e")).unwrap_err(),
            DecodeError::UnrecognizedType("0x7e".to_string())
        );
        assert!(TransactionKind::from_type_tag(Some("legacy")).is_err());
    }

    #[test]
    fn test_decode_legacy_transfer() {
        let tx = decode(Some(&legacy_transfer()), None, SENDER).unwrap();

        assert_eq!(tx.kind, TransactionKind::Legacy);
        assert_eq!(tx.from, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        assert_eq!(tx.value, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(tx.gas_price, Some(U256::from(20_000_000_000u64)));
        assert_eq!(tx.max_fee_per_gas, None);
        assert_eq!(tx.max_priority_fee_per_gas, None);
        // no receipt: falls back to the declared price
        assert_eq!(tx.effective_gas_price, tx.gas_price);
        assert_eq!(tx.estimated_intrinsic_gas, 21_000);
        assert!(tx.access_list.is_empty());
        assert_eq!(tx.chain_id, U256::from(1));
    }

    #[test]
    fn test_decode_dynamic_fee_without_receipt() {
        let tx = decode(Some(&dynamic_fee_call()), None, SENDER).unwrap();

        assert_eq!(tx.kind, TransactionKind::DynamicFee);
        assert_eq!(tx.gas_price, None);
        assert_eq!(tx.max_fee_per_gas, Some(U256::from(30_000_000_000u64)));
        assert_eq!(tx.max_priority_fee_per_gas, Some(U256::from(2_000_000_000u64)));
        assert_eq!(tx.effective_gas_price, None);
        assert_eq!(tx.blob_gas_used, None);
        // 21000 + 4*16 + 4 + 2400 + 1900
        assert_eq!(tx.estimated_intrinsic_gas, 21_000 + 64 + 4 + 2_400 + 1_900);
    }

    #[test]
    fn test_decode_with_receipt_uses_effective_price() {
        let tx = decode(Some(&dynamic_fee_call()), Some(&receipt(12_000_000_000)), SENDER).unwrap();
        assert_eq!(tx.effective_gas_price, Some(U256::from(12_000_000_000u64)));
        // blob gas is only copied for blob transactions
        assert_eq!(tx.blob_gas_used, None);
    }

    #[test]
    fn test_access_list_kind_uses_gas_price_as_caps() {
        let raw = RawTransaction {
            tx_type: Some("0x1".to_string()),
            access_list: Some(vec![]),
            ..legacy_transfer()
        };
        let tx = decode(Some(&raw), None, SENDER).unwrap();
        assert_eq!(tx.gas_price, None);
        assert_eq!(tx.max_fee_per_gas, Some(U256::from(20_000_000_000u64)));
        assert_eq!(tx.max_priority_fee_per_gas, Some(U256::from(20_000_000_000u64)));
        assert_eq!(tx.effective_gas_price, None);
    }

    #[test]
    fn test_decode_blob_transaction() {
        let raw = RawTransaction {
            tx_type: Some("0x3".to_string()),
            max_fee_per_blob_gas: Some("0x3b9aca00".to_string()),
            blob_versioned_hashes: Some(vec![format!("0x01{}", "00".repeat(31))]),
            ..dynamic_fee_call()
        };

        let tx = decode(Some(&raw), Some(&receipt(12_000_000_000)), SENDER).unwrap();
        assert_eq!(tx.kind, TransactionKind::Blob);
        assert_eq!(tx.max_fee_per_blob_gas, Some(U256::from(1_000_000_000u64)));
        assert_eq!(tx.blob_gas_used, Some(131_072));
        assert_eq!(tx.declared_blob_gas(), Some(131_072));
        // blob transactions still pay for their access list
        assert_eq!(tx.estimated_intrinsic_gas, 21_000 + 64 + 4 + 2_400 + 1_900);
    }

    #[test]
    fn test_blob_without_fee_cap_fails() {
        let raw = RawTransaction {
            tx_type: Some("0x3".to_string()),
            ..dynamic_fee_call()
        };
        assert_eq!(
            decode(Some(&raw), None, SENDER).unwrap_err(),
            DecodeError::MissingField("maxFeePerBlobGas")
        );
    }

    #[test]
    fn test_contract_creation() {
        let raw = RawTransaction {
            to: None,
            input: "0x6080".to_string(),
            ..legacy_transfer()
        };
        let tx = decode(Some(&raw), None, SENDER).unwrap();
        assert!(tx.is_contract_creation());
        assert_eq!(tx.estimated_intrinsic_gas, 21_000 + 16 + 16 + 32_000);
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(
            decode(None, None, SENDER).unwrap_err(),
            DecodeError::MissingTransaction
        );

        let unknown = RawTransaction {
            tx_type: Some("0x5".to_string()),
            ..legacy_transfer()
        };
        assert!(matches!(
            decode(Some(&unknown), None, SENDER),
            Err(DecodeError::UnrecognizedType(_))
        ));

        let short_to = RawTransaction {
            to: Some("0x12345678".to_string()),
            ..legacy_transfer()
        };
        assert!(matches!(
            decode(Some(&short_to), None, SENDER),
            Err(DecodeError::InvalidWidth { field: "to", .. })
        ));

        let no_price = RawTransaction {
            gas_price: None,
            ..legacy_transfer()
        };
        assert_eq!(
            decode(Some(&no_price), None, SENDER).unwrap_err(),
            DecodeError::MissingField("gasPrice")
        );
    }

    #[test]
    fn test_legacy_drops_echoed_access_list() {
        let raw = RawTransaction {
            access_list: dynamic_fee_call().access_list,
            ..legacy_transfer()
        };
        let tx = decode(Some(&raw), None, SENDER).unwrap();
        assert!(tx.access_list.is_empty());
        assert_eq!(tx.estimated_intrinsic_gas, 21_000);
    }

    #[test]
    fn test_decode_signed_reports_shape_before_signature() {
        let raw = RawTransaction {
            tx_type: Some("0x4".to_string()),
            ..sender::tests::signed_raw(sender::tests::eip1559_tx())
        };
        assert!(matches!(
            decode_signed(&raw, None),
            Err(error::Error::Decode(DecodeError::UnrecognizedType(_)))
        ));

        let tx = decode_signed(&sender::tests::signed_raw(sender::tests::eip1559_tx()), None)
            .unwrap();
        assert_eq!(tx.from, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    }

    #[test]
    fn test_missing_chain_id_defaults_to_zero() {
        let raw = RawTransaction {
            chain_id: None,
            ..legacy_transfer()
        };
        let tx = decode(Some(&raw), None, SENDER).unwrap();
        assert_eq!(tx.chain_id, U256::ZERO);
    }
}
