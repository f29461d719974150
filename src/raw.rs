//! Wire shapes returned by an execution node, as close to the JSON-RPC
//! objects as possible. Nothing here is validated until it is decoded.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DecodeError;

/// `eth_getTransactionByHash` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    // Absent on untyped transactions served by pre-Berlin nodes
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<String>,
    pub nonce: String,
    #[serde(default)]
    pub to: Option<String>,
    pub value: String,
    #[serde(alias = "gasLimit")]
    pub gas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_blob_gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<RawAccessListItem>>,
    #[serde(default, alias = "data")]
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<String>>,
    /// Sender as reported by the node. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_parity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccessListItem {
    pub address: String,
    #[serde(default)]
    pub storage_keys: Vec<String>,
}

/// `eth_getTransactionReceipt` object, trimmed to the fields we read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub gas_used: String,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
    #[serde(default)]
    pub blob_gas_used: Option<String>,
    #[serde(default)]
    pub blob_gas_price: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
}

/// Subset of a block header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHeader {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
    #[serde(default)]
    pub excess_blob_gas: Option<String>,
}

/// A `debug_traceTransaction` result in either of the two shapes we accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTrace {
    Steps(RawStructLogs),
    Calls(RawCallFrame),
}

/// Default (struct logger) tracer output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStructLogs {
    #[serde(default)]
    pub gas: Option<u64>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub return_value: Option<String>,
    pub struct_logs: Vec<RawStep>,
}

/// One executed instruction.
///
/// The frame tags are only meaningful on the first step of a new frame and
/// are absent in plain struct-logger output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    pub op: String,
    pub depth: u64,
    pub gas: u64,
    pub gas_cost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

/// `callTracer` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCallFrame {
    #[serde(rename = "type")]
    pub call_type: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    pub gas: String,
    pub gas_used: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<RawCallFrame>,
}

/// A receipt after width and quantity checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: Option<String>,
    pub success: Option<bool>,
    pub gas_used: u64,
    pub effective_gas_price: Option<U256>,
    pub blob_gas_used: Option<u64>,
    pub blob_gas_price: Option<U256>,
    pub block_hash: Option<String>,
    pub block_number: Option<u64>,
    pub transaction_index: Option<u64>,
    pub contract_address: Option<String>,
}

impl TryFrom<&RawReceipt> for Receipt {
    type Error = DecodeError;

    fn try_from(raw: &RawReceipt) -> Result<Self, Self::Error> {
        let success = raw
            .status
            .as_deref()
            .map(|s| codec::parse_u64("status", s).map(|status| status == 1))
            .transpose()?;

        Ok(Self {
            transaction_hash: raw
                .transaction_hash
                .as_deref()
                .map(|h| codec::hash("transactionHash", h))
                .transpose()?,
            success,
            gas_used: codec::parse_u64("gasUsed", &raw.gas_used)?,
            effective_gas_price: codec::opt_quantity(
                "effectiveGasPrice",
                raw.effective_gas_price.as_deref(),
            )?,
            blob_gas_used: codec::opt_u64("blobGasUsed", raw.blob_gas_used.as_deref())?,
            blob_gas_price: codec::opt_quantity("blobGasPrice", raw.blob_gas_price.as_deref())?,
            block_hash: raw
                .block_hash
                .as_deref()
                .map(|h| codec::hash("blockHash", h))
                .transpose()?,
            block_number: codec::opt_u64("blockNumber", raw.block_number.as_deref())?,
            transaction_index: codec::opt_u64(
                "transactionIndex",
                raw.transaction_index.as_deref(),
            )?,
            contract_address: raw
                .contract_address
                .as_deref()
                .map(|a| codec::address("contractAddress", a))
                .transpose()?,
        })
    }
}

/// A header after width and quantity checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub hash: Option<String>,
    pub number: Option<u64>,
    pub base_fee_per_gas: Option<U256>,
    pub excess_blob_gas: Option<u64>,
}

impl TryFrom<&RawHeader> for BlockHeader {
    type Error = DecodeError;

    fn try_from(raw: &RawHeader) -> Result<Self, Self::Error> {
        Ok(Self {
            hash: raw
                .hash
                .as_deref()
                .map(|h| codec::hash("hash", h))
                .transpose()?,
            number: codec::opt_u64("number", raw.number.as_deref())?,
            base_fee_per_gas: codec::opt_quantity(
                "baseFeePerGas",
                raw.base_fee_per_gas.as_deref(),
            )?,
            excess_blob_gas: codec::opt_u64("excessBlobGas", raw.excess_blob_gas.as_deref())?,
        })
    }
}
