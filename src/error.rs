use alloy::transports::TransportError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Signature Error: {0}")]
    Signature(String),
    #[error("Malformed Trace: {0}")]
    TraceMalformed(#[from] TraceMalformedError),
    #[error("Input Unavailable: {0}")]
    InputUnavailable(String),
    #[error("Alloy Transport Error: {0}")]
    Transport(#[from] TransportError),
    #[error("Request timed out after {0}s: {1}")]
    Timeout(u64, &'static str),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("transaction is missing")]
    MissingTransaction,
    #[error("unrecognized transaction type tag {0}")]
    UnrecognizedType(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not valid hex")]
    InvalidHex { field: &'static str },
    #[error("field `{field}` must be {expected} bytes, got {actual}")]
    InvalidWidth {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("field `{field}` is not a valid quantity: {value}")]
    InvalidQuantity { field: &'static str, value: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceMalformedError {
    #[error("step {step}: depth jumped from {from} to {to}")]
    DepthJump { step: usize, from: usize, to: usize },
    #[error("step {step}: depth {depth} pops below the root frame")]
    PopBelowRoot { step: usize, depth: u64 },
    #[error("step stream starts at depth {0}, expected 0 or 1")]
    BadRootDepth(u64),
    #[error("step {step}: cannot determine call type for new frame")]
    UnknownCallType { step: usize },
    #[error("unrecognized call type `{0}`")]
    UnrecognizedCallType(String),
    #[error("frame at depth {depth} used {gas_used} gas with a limit of {gas_limit}")]
    GasExceedsLimit {
        depth: usize,
        gas_used: u64,
        gas_limit: u64,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub type Result<T> = std::result::Result<T, Error>;
