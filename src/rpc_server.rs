use crate::analyzer::GasAnalysis;
use crate::client::{NodeClient, TraceMode};
use crate::config::Config;
use crate::decoder::Transaction;
use crate::error::Error;
use crate::inspector::{self, Inspection};
use crate::raw::{RawHeader, RawReceipt, RawTrace, RawTransaction};
use crate::tracer::{Trace, TraceBuilder};
use jsonrpsee::{
    core::{async_trait, RpcResult},
    proc_macros::rpc,
    server::{ServerBuilder, ServerHandle},
    types::ErrorObjectOwned,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

const INTERNAL_ERROR: i32 = -32603;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectRequest {
    pub tx_hash: String,
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub tracer: Option<TraceMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeRequest {
    pub transaction: RawTransaction,
    pub receipt: Option<RawReceipt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub transaction: RawTransaction,
    pub receipt: Option<RawReceipt>,
    pub header: Option<RawHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRequest {
    pub tx_hash: String,
    pub trace: RawTrace,
}

// Define the JSON-RPC interface
#[rpc(server)]
pub trait InspectorRpc {
    #[method(name = "inspect_transaction")]
    async fn inspect_transaction(&self, request: InspectRequest) -> RpcResult<Inspection>;

    #[method(name = "decode_transaction")]
    async fn decode_transaction(&self, request: DecodeRequest) -> RpcResult<Transaction>;

    #[method(name = "analyze_gas")]
    async fn analyze_gas(&self, request: AnalyzeRequest) -> RpcResult<GasAnalysis>;

    #[method(name = "build_trace")]
    async fn build_trace(&self, request: TraceRequest) -> RpcResult<Trace>;
}

/// Malformed caller input is reported as invalid params, everything else as
/// an internal error.
fn rpc_error(context: &str, e: Error) -> ErrorObjectOwned {
    let code = match e {
        Error::Decode(_) | Error::TraceMalformed(_) | Error::Signature(_) => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    };
    warn!(code, error = %e, "{}", context);
    ErrorObjectOwned::owned(code, format!("{}: {}", context, e), None::<String>)
}

pub struct InspectorRpcImpl {
    config: Config,
}

impl InspectorRpcImpl {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl InspectorRpcServer for InspectorRpcImpl {
    async fn inspect_transaction(&self, request: InspectRequest) -> RpcResult<Inspection> {
        // Use provided RPC URL or fallback to default
        let rpc_url = request.rpc_url.as_ref().unwrap_or(&self.config.rpc_url);
        debug!(tx_hash = %request.tx_hash, rpc_url = %rpc_url, "inspect_transaction");

        let client = NodeClient::connect(rpc_url, self.config.rpc_timeout())
            .await
            .map_err(|e| rpc_error("Failed to connect to node", e))?
            .with_trace_mode(request.tracer.unwrap_or_default());

        inspector::inspect(&client, &request.tx_hash)
            .await
            .map_err(|e| rpc_error("Inspection failed", e))
    }

    async fn decode_transaction(&self, request: DecodeRequest) -> RpcResult<Transaction> {
        inspector::decode_raw(&request.transaction, request.receipt.as_ref())
            .map_err(|e| rpc_error("Decoding failed", e))
    }

    async fn analyze_gas(&self, request: AnalyzeRequest) -> RpcResult<GasAnalysis> {
        inspector::analyze_raw(
            &request.transaction,
            request.receipt.as_ref(),
            request.header.as_ref(),
        )
        .map(|(_, gas)| gas)
        .map_err(|e| rpc_error("Gas analysis failed", e))
    }

    async fn build_trace(&self, request: TraceRequest) -> RpcResult<Trace> {
        TraceBuilder::new(request.tx_hash)
            .build(&request.trace)
            .map_err(|e| rpc_error("Trace building failed", e.into()))
    }
}

pub struct RpcServer {
    handle: ServerHandle,
    addr: SocketAddr,
}

impl RpcServer {
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        // Setup CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any);

        // Build the server
        let server = ServerBuilder::default()
            .set_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(config.bind_addr)
            .await?;

        let addr = server.local_addr()?;
        let rpc_impl = InspectorRpcImpl::new(config);
        let handle = server.start(rpc_impl.into_rpc());
        Ok(Self { handle, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn stop(self) -> Result<(), Box<dyn std::error::Error>> {
        self.handle
            .stop()
            .map_err(|e| format!("Failed to stop server: {:?}", e))?;
        self.handle.stopped().await;
        Ok(())
    }
}
