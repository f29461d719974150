use std::time::Duration;

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raw::{RawHeader, RawReceipt, RawTrace, RawTransaction};

/// Which tracer `debug_traceTransaction` is asked to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraceMode {
    /// Per-instruction struct logs, giving opcode counts per frame
    #[default]
    StructLogs,
    /// Nested call frames only
    CallTracer,
}

impl TraceMode {
    fn options(self) -> serde_json::Value {
        match self {
            Self::StructLogs => json!({
                "disableStack": true,
                "disableStorage": true,
                "enableMemory": false,
                "enableReturnData": false,
            }),
            Self::CallTracer => json!({ "tracer": "callTracer" }),
        }
    }
}

/// Everything the node knows about one transaction.
#[derive(Debug)]
pub struct NodeData {
    pub transaction: RawTransaction,
    /// `None` while the transaction is pending
    pub receipt: Option<RawReceipt>,
    pub header: Option<RawHeader>,
    pub trace: Result<RawTrace>,
}

/// Fetch layer over an execution node's JSON-RPC API.
pub struct NodeClient {
    provider: DynProvider,
    timeout: Duration,
    trace_mode: TraceMode,
}

impl NodeClient {
    pub async fn connect(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let provider = ProviderBuilder::new().connect(rpc_url).await?.erased();
        debug!(rpc_url, "connected to node");

        Ok(Self {
            provider,
            timeout,
            trace_mode: TraceMode::default(),
        })
    }

    pub fn with_trace_mode(mut self, trace_mode: TraceMode) -> Self {
        self.trace_mode = trace_mode;
        self
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: Serialize + Clone + std::fmt::Debug + Send + Sync + Unpin + 'static,
        R: DeserializeOwned + std::fmt::Debug + Send + Sync + Unpin + 'static,
    {
        debug!(method, "node request");
        let call = self.provider.raw_request::<P, R>(method.into(), params);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.timeout.as_secs(), method)),
        }
    }

    pub async fn transaction(&self, tx_hash: &str) -> Result<Option<RawTransaction>> {
        self.request("eth_getTransactionByHash", (tx_hash.to_string(),))
            .await
    }

    pub async fn receipt(&self, tx_hash: &str) -> Result<Option<RawReceipt>> {
        self.request("eth_getTransactionReceipt", (tx_hash.to_string(),))
            .await
    }

    /// Header of the block with the given hex number, without bodies.
    pub async fn header(&self, block_number: &str) -> Result<Option<RawHeader>> {
        self.request("eth_getBlockByNumber", (block_number.to_string(), false))
            .await
    }

    pub async fn trace(&self, tx_hash: &str) -> Result<RawTrace> {
        self.request(
            "debug_traceTransaction",
            (tx_hash.to_string(), self.trace_mode.options()),
        )
        .await
    }

    /// Fetch transaction, receipt and trace together, then the header of the
    /// receipt's block. A trace failure is kept rather than propagated.
    pub async fn fetch(&self, tx_hash: &str) -> Result<NodeData> {
        let (transaction, receipt, trace) = tokio::try_join!(
            self.transaction(tx_hash),
            self.receipt(tx_hash),
            async { Ok::<_, Error>(self.trace(tx_hash).await) },
        )?;

        let transaction =
            transaction.ok_or_else(|| Error::NotFound(format!("transaction {tx_hash}")))?;

        let header = match receipt.as_ref().and_then(|r| r.block_number.as_deref()) {
            Some(number) => self.header(number).await?,
            None => None,
        };

        info!(
            tx_hash,
            pending = receipt.is_none(),
            traced = trace.is_ok(),
            "fetched transaction"
        );

        Ok(NodeData {
            transaction,
            receipt,
            header,
            trace,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonrpsee::server::{ServerBuilder, ServerHandle};
    use jsonrpsee::types::ErrorObjectOwned;
    use jsonrpsee::RpcModule;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::net::SocketAddr;

    /// Canned node responses, keyed by JSON-RPC method.
    #[derive(Clone, Default)]
    pub(crate) struct MockNode {
        pub transaction: Value,
        pub receipt: Value,
        pub header: Value,
        pub trace: Option<Value>,
    }

    fn reply(value: &Value) -> std::result::Result<Value, ErrorObjectOwned> {
        Ok(value.clone())
    }

    pub(crate) async fn spawn_mock_node(node: MockNode) -> (ServerHandle, String) {
        let mut module = RpcModule::new(node);
        module
            .register_method("eth_getTransactionByHash", |_, node| reply(&node.transaction))
            .unwrap();
        module
            .register_method("eth_getTransactionReceipt", |_, node| reply(&node.receipt))
            .unwrap();
        module
            .register_method("eth_getBlockByNumber", |_, node| reply(&node.header))
            .unwrap();
        module
            .register_method(
                "debug_traceTransaction",
                |_, node| -> std::result::Result<Value, ErrorObjectOwned> {
                    node.trace.clone().ok_or_else(|| {
                        ErrorObjectOwned::owned(-32000, "transaction not traceable", None::<()>)
                    })
                },
            )
            .unwrap();

        let server = ServerBuilder::default()
            .build("127.0.0.1:0".parse::<SocketAddr>().unwrap())
            .await
            .unwrap();
        let url = format!("http://{}", server.local_addr().unwrap());
        (server.start(module), url)
    }

    #[tokio::test]
    async fn test_missing_transaction_is_not_found() {
        let (handle, url) = spawn_mock_node(MockNode::default()).await;
        let client = NodeClient::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();

        let result = client.fetch(&format!("0x{}", "ab".repeat(32))).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_pending_transaction_has_no_receipt_or_header() {
        let node = MockNode {
            transaction: json!({
                "type": "0x0",
                "nonce": "0x1",
                "to": format!("0x{}", "11".repeat(20)),
                "value": "0x0",
                "gas": "0x5208",
                "gasPrice": "0x1",
                "input": "0x"
            }),
            ..Default::default()
        };
        let (handle, url) = spawn_mock_node(node).await;
        let client = NodeClient::connect(&url, Duration::from_secs(5))
            .await
            .unwrap();

        let data = client.fetch(&format!("0x{}", "ab".repeat(32))).await.unwrap();
        assert!(data.receipt.is_none());
        assert!(data.header.is_none());
        assert!(data.trace.is_err());
        assert_eq!(data.transaction.gas, "0x5208");
        handle.stop().unwrap();
    }

    #[test]
    fn test_trace_mode_options() {
        assert_eq!(
            TraceMode::CallTracer.options(),
            json!({ "tracer": "callTracer" })
        );
        assert_eq!(TraceMode::StructLogs.options()["disableStack"], json!(true));
    }
}
