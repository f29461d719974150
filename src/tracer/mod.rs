use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use alloy::primitives::U256;
use revm::bytecode::opcode::{self, OpCode};
use serde::{Deserialize, Serialize};

use crate::decoder::Transaction;
use crate::error::TraceMalformedError;
use crate::raw::{RawCallFrame, RawStep, RawTrace};

mod calls;
mod steps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallType {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

impl CallType {
    /// The frame kind opened by an opcode, if it opens one.
    pub fn from_opcode(op: u8) -> Option<Self> {
        match op {
            opcode::CALL => Some(Self::Call),
            opcode::CALLCODE => Some(Self::CallCode),
            opcode::DELEGATECALL => Some(Self::DelegateCall),
            opcode::STATICCALL => Some(Self::StaticCall),
            opcode::CREATE => Some(Self::Create),
            opcode::CREATE2 => Some(Self::Create2),
            _ => None,
        }
    }
}

impl FromStr for CallType {
    type Err = TraceMalformedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CALL" => Ok(Self::Call),
            "CALLCODE" => Ok(Self::CallCode),
            "DELEGATECALL" => Ok(Self::DelegateCall),
            "STATICCALL" => Ok(Self::StaticCall),
            "CREATE" => Ok(Self::Create),
            "CREATE2" => Ok(Self::Create2),
            _ => Err(TraceMalformedError::UnrecognizedCallType(s.to_string())),
        }
    }
}

/// Per-frame opcode counters. Children are not included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcodeStats {
    pub total: u64,
    pub calls: u64,
    pub sloads: u64,
    pub sstores: u64,
    pub logs: u64,
    pub reverts: u64,
    pub invalids: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpClass {
    Call,
    Sload,
    Sstore,
    Log,
    Revert,
    Invalid,
    Other,
}

impl OpcodeStats {
    pub(crate) fn record(&mut self, class: OpClass) {
        self.total += 1;
        match class {
            OpClass::Call => self.calls += 1,
            OpClass::Sload => self.sloads += 1,
            OpClass::Sstore => self.sstores += 1,
            OpClass::Log => self.logs += 1,
            OpClass::Revert => self.reverts += 1,
            OpClass::Invalid => self.invalids += 1,
            OpClass::Other => {}
        }
    }
}

fn opcode_table() -> &'static HashMap<&'static str, u8> {
    static TABLE: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<&'static str, u8> = (0..=u8::MAX)
            .filter_map(|byte| OpCode::new(byte).map(|op| (op.as_str(), byte)))
            .collect();
        // Mnemonics that differ between clients and forks
        table.insert("SHA3", 0x20);
        table.insert("DIFFICULTY", 0x44);
        table.insert("PREVRANDAO", 0x44);
        table.insert("SUICIDE", 0xff);
        table
    })
}

/// Map a mnemonic to its opcode byte.
pub fn opcode_byte(name: &str) -> Option<u8> {
    opcode_table().get(name).copied()
}

pub(crate) fn classify(name: &str) -> (Option<u8>, OpClass) {
    let byte = opcode_byte(name);
    let class = match byte {
        Some(opcode::CALL | opcode::CALLCODE | opcode::DELEGATECALL | opcode::STATICCALL) => {
            OpClass::Call
        }
        Some(opcode::SLOAD) => OpClass::Sload,
        Some(opcode::SSTORE) => OpClass::Sstore,
        Some(opcode::LOG0..=opcode::LOG4) => OpClass::Log,
        Some(opcode::REVERT) => OpClass::Revert,
        Some(opcode::INVALID) => OpClass::Invalid,
        Some(_) => OpClass::Other,
        // geth renders undefined bytes as "opcode 0x.. not defined"
        None if name.starts_with("opcode") || name.eq_ignore_ascii_case("invalid") => {
            OpClass::Invalid
        }
        None => OpClass::Other,
    };
    (byte, class)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: U256,
    pub depth: usize,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub opcodes: OpcodeStats,
    /// Set exactly when the frame reverted or faulted.
    pub error: Option<String>,
}

/// Call-frame tree of one transaction, flattened in pre-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub tx_hash: String,
    pub total_gas_used: u64,
    pub frames: Vec<CallFrame>,
    pub error: Option<String>,
}

impl Trace {
    pub fn root(&self) -> Option<&CallFrame> {
        self.frames.first()
    }
}

/// What we know about the outermost frame before reading the trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootContext {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: U256,
    pub gas_limit: Option<u64>,
    pub is_creation: bool,
}

impl RootContext {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            from: Some(tx.from.clone()),
            to: tx.to.clone(),
            value: tx.value,
            gas_limit: Some(tx.gas_limit),
            is_creation: tx.is_contract_creation(),
        }
    }

    fn call_type(&self) -> CallType {
        if self.is_creation {
            CallType::Create
        } else {
            CallType::Call
        }
    }
}

/// Builds a [`Trace`] from either step stream or call-tracer output.
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    tx_hash: String,
    root: RootContext,
}

impl TraceBuilder {
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            root: RootContext::default(),
        }
    }

    pub fn with_root(mut self, root: RootContext) -> Self {
        self.root = root;
        self
    }

    pub fn build(&self, raw: &RawTrace) -> Result<Trace, TraceMalformedError> {
        match raw {
            RawTrace::Steps(logs) => {
                let mut trace = self.build_from_steps(&logs.struct_logs)?;
                if logs.failed && trace.error.is_none() {
                    trace.error = Some("execution failed".to_string());
                }
                Ok(trace)
            }
            RawTrace::Calls(root) => self.build_from_calls(root),
        }
    }

    pub fn build_from_steps(&self, steps: &[RawStep]) -> Result<Trace, TraceMalformedError> {
        let frames = steps::build_frames(&self.root, steps)?;
        Ok(self.finish(frames))
    }

    pub fn build_from_calls(&self, root: &RawCallFrame) -> Result<Trace, TraceMalformedError> {
        let frames = calls::flatten(root)?;
        Ok(self.finish(frames))
    }

    fn finish(&self, frames: Vec<CallFrame>) -> Trace {
        let (total_gas_used, error) = frames
            .first()
            .map(|root| (root.gas_used, root.error.clone()))
            .unwrap_or_default();
        Trace {
            tx_hash: self.tx_hash.clone(),
            total_gas_used,
            frames,
            error,
        }
    }
}

/// Build a trace from a step stream with no knowledge of the transaction.
pub fn build(tx_hash: &str, steps: &[RawStep]) -> Result<Trace, TraceMalformedError> {
    TraceBuilder::new(tx_hash).build_from_steps(steps)
}
