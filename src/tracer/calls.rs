//! Flattening of call-tracer output into pre-order frames.

use tracing::debug;

use super::{CallFrame, CallType, OpcodeStats};
use crate::codec;
use crate::error::TraceMalformedError;
use crate::raw::RawCallFrame;

pub(super) fn flatten(root: &RawCallFrame) -> Result<Vec<CallFrame>, TraceMalformedError> {
    let mut frames = Vec::new();
    // Explicit stack instead of recursion; children are pushed in reverse so
    // they come off in emission order.
    let mut pending = vec![(root, 0usize)];

    while let Some((raw, depth)) = pending.pop() {
        if raw.call_type.eq_ignore_ascii_case("SELFDESTRUCT") {
            debug!(depth, "skipping selfdestruct pseudo-frame");
            continue;
        }

        let gas_limit = codec::parse_u64("gas", &raw.gas)?;
        let gas_used = codec::parse_u64("gasUsed", &raw.gas_used)?;
        if gas_used > gas_limit {
            return Err(TraceMalformedError::GasExceedsLimit {
                depth,
                gas_used,
                gas_limit,
            });
        }

        frames.push(CallFrame {
            call_type: raw.call_type.parse::<CallType>()?,
            from: Some(codec::address("from", &raw.from)?),
            to: raw
                .to
                .as_deref()
                .map(|to| codec::address("to", to))
                .transpose()?,
            value: codec::opt_quantity("value", raw.value.as_deref())?.unwrap_or_default(),
            depth,
            gas_limit,
            gas_used,
            opcodes: OpcodeStats::default(),
            error: raw.error.clone().filter(|e| !e.is_empty()),
        });

        pending.extend(raw.calls.iter().rev().map(|child| (child, depth + 1)));
    }

    Ok(frames)
}
