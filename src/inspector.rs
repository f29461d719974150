use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyzer::{self, GasAnalysis};
use crate::client::{NodeClient, NodeData};
use crate::decoder::{self, Transaction};
use crate::error::Result;
use crate::raw::{BlockHeader, RawHeader, RawReceipt, RawTrace, RawTransaction, Receipt};
use crate::tracer::{RootContext, Trace, TraceBuilder};

/// Decoded transaction, its fee ledger and its call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub transaction: Transaction,
    pub gas: GasAnalysis,
    pub trace: Option<Trace>,
    /// Why `trace` is missing, when it is.
    pub trace_error: Option<String>,
    pub pending: bool,
}

/// Parse a receipt and decode the transaction it belongs to.
pub fn decode_raw(raw: &RawTransaction, receipt: Option<&RawReceipt>) -> Result<Transaction> {
    let receipt = receipt.map(Receipt::try_from).transpose()?;
    decoder::decode_signed(raw, receipt.as_ref())
}

/// Decode and build the fee ledger in one step.
pub fn analyze_raw(
    raw: &RawTransaction,
    receipt: Option<&RawReceipt>,
    header: Option<&RawHeader>,
) -> Result<(Transaction, GasAnalysis)> {
    let parsed_receipt = receipt.map(Receipt::try_from).transpose()?;
    let header = header.map(BlockHeader::try_from).transpose()?;
    let tx = decoder::decode_signed(raw, parsed_receipt.as_ref())?;
    let gas = analyzer::analyze(&tx, parsed_receipt.as_ref(), header.as_ref());
    Ok((tx, gas))
}

/// Build the call tree with the root frame seeded from `tx`.
pub fn trace_transaction(tx: &Transaction, raw: &RawTrace) -> Result<Trace> {
    let trace = TraceBuilder::new(tx.hash.clone())
        .with_root(RootContext::from_transaction(tx))
        .build(raw)?;
    Ok(trace)
}

/// Turn everything fetched for one transaction into an [`Inspection`].
pub fn assemble(data: NodeData) -> Result<Inspection> {
    let pending = data.receipt.is_none();
    let (transaction, gas) = analyze_raw(
        &data.transaction,
        data.receipt.as_ref(),
        data.header.as_ref(),
    )?;

    let (trace, trace_error) = match data
        .trace
        .and_then(|raw| trace_transaction(&transaction, &raw))
    {
        Ok(trace) => (Some(trace), None),
        Err(e) => {
            warn!(tx_hash = %transaction.hash, error = %e, "trace unavailable");
            (None, Some(e.to_string()))
        }
    };

    Ok(Inspection {
        transaction,
        gas,
        trace,
        trace_error,
        pending,
    })
}

/// Fetch one transaction from the node and inspect it.
pub async fn inspect(client: &NodeClient, tx_hash: &str) -> Result<Inspection> {
    let data = client.fetch(tx_hash).await?;
    let inspection = assemble(data)?;
    info!(
        tx_hash,
        kind = ?inspection.transaction.kind,
        gas_used = inspection.gas.gas_used,
        frames = inspection.trace.as_ref().map_or(0, |t| t.frames.len()),
        reverted = inspection
            .trace
            .as_ref()
            .and_then(Trace::root)
            .is_some_and(|root| root.error.is_some()),
        "inspected transaction"
    );
    Ok(inspection)
}
