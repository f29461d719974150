//! Single-pass stack machine over a depth-tagged step stream.
//!
//! Frames are appended to the output when they are opened, so the output is
//! pre-order no matter how deep the tree goes. Memory held on the stack is
//! proportional to the maximum call depth.

use alloy::primitives::U256;
use tracing::trace;

use super::{classify, CallFrame, CallType, OpClass, OpcodeStats, RootContext};
use crate::codec;
use crate::error::TraceMalformedError;
use crate::raw::RawStep;

/// A frame that has been opened and not yet finalized.
struct OpenFrame {
    /// Position of the frame in the output.
    index: usize,
    /// Gas available before the frame's first step.
    entry_gas: u64,
    /// Gas remaining after the frame's latest step.
    exit_gas: Option<u64>,
    last_op: Option<u8>,
    pending_error: Option<String>,
}

impl OpenFrame {
    fn new(index: usize, entry_gas: u64) -> Self {
        Self {
            index,
            entry_gas,
            exit_gas: None,
            last_op: None,
            pending_error: None,
        }
    }

    fn finalize(self, frames: &mut [CallFrame]) {
        let frame = &mut frames[self.index];
        let exit_gas = self.exit_gas.unwrap_or(self.entry_gas);
        frame.gas_used = self.entry_gas.saturating_sub(exit_gas).min(frame.gas_limit);
        frame.error = self.pending_error;
        trace!(
            depth = frame.depth,
            gas_used = frame.gas_used,
            error = ?frame.error,
            "frame closed"
        );
    }
}

fn terminal_error(step: &RawStep, class: OpClass) -> Option<String> {
    if let Some(error) = step.error.as_ref().filter(|e| !e.is_empty()) {
        return Some(error.clone());
    }
    match class {
        OpClass::Revert => Some("execution reverted".to_string()),
        OpClass::Invalid => Some("invalid opcode".to_string()),
        _ => None,
    }
}

pub(super) fn build_frames(
    root: &RootContext,
    steps: &[RawStep],
) -> Result<Vec<CallFrame>, TraceMalformedError> {
    // geth counts depth from 1; whatever the first step says is the root.
    let base_depth = steps.first().map(|s| s.depth).unwrap_or_default();
    if base_depth > 1 {
        return Err(TraceMalformedError::BadRootDepth(base_depth));
    }

    let entry_gas = steps.first().map(|s| s.gas).unwrap_or_default();
    let mut frames = vec![CallFrame {
        call_type: root.call_type(),
        from: root.from.clone(),
        to: root.to.clone(),
        value: root.value,
        depth: 0,
        gas_limit: root.gas_limit.unwrap_or(entry_gas).max(entry_gas),
        gas_used: 0,
        opcodes: OpcodeStats::default(),
        error: None,
    }];
    let mut stack = vec![OpenFrame::new(0, entry_gas)];

    for (i, step) in steps.iter().enumerate() {
        let depth = step
            .depth
            .checked_sub(base_depth)
            .ok_or(TraceMalformedError::PopBelowRoot {
                step: i,
                depth: step.depth,
            })? as usize;
        let current = stack.len() - 1;

        if depth > current + 1 {
            return Err(TraceMalformedError::DepthJump {
                step: i,
                from: current,
                to: depth,
            });
        }

        if depth == current + 1 {
            let frame = open_child(&frames, &stack, step, i, depth)?;
            frames.push(frame);
            stack.push(OpenFrame::new(frames.len() - 1, step.gas));
        }

        while stack.len() - 1 > depth {
            if let Some(open) = stack.pop() {
                open.finalize(&mut frames);
            }
        }

        let (byte, class) = classify(&step.op);
        let Some(top) = stack.last_mut() else {
            return Err(TraceMalformedError::PopBelowRoot {
                step: i,
                depth: step.depth,
            });
        };
        frames[top.index].opcodes.record(class);
        top.last_op = byte;
        top.exit_gas = Some(step.gas.saturating_sub(step.gas_cost));
        top.pending_error = terminal_error(step, class);
    }

    while let Some(open) = stack.pop() {
        open.finalize(&mut frames);
    }

    Ok(frames)
}

fn open_child(
    frames: &[CallFrame],
    stack: &[OpenFrame],
    step: &RawStep,
    index: usize,
    depth: usize,
) -> Result<CallFrame, TraceMalformedError> {
    let parent = stack
        .last()
        .ok_or(TraceMalformedError::UnknownCallType { step: index })?;

    let call_type = match step.call_type.as_deref() {
        Some(tag) => tag.parse()?,
        None => parent
            .last_op
            .and_then(CallType::from_opcode)
            .ok_or(TraceMalformedError::UnknownCallType { step: index })?,
    };

    let from = match step.from.as_deref() {
        Some(from) => Some(codec::address("from", from)?),
        None => frames[parent.index].to.clone(),
    };
    let to = step
        .to
        .as_deref()
        .map(|to| codec::address("to", to))
        .transpose()?;
    let value = codec::opt_quantity("value", step.value.as_deref())?.unwrap_or(U256::ZERO);

    trace!(step = index, depth, ?call_type, "frame opened");

    Ok(CallFrame {
        call_type,
        from,
        to,
        value,
        depth,
        gas_limit: step.gas_limit.unwrap_or(step.gas),
        gas_used: 0,
        opcodes: OpcodeStats::default(),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{build, Trace, TraceBuilder};
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn step(op: &str, depth: u64, gas: u64, gas_cost: u64) -> RawStep {
        RawStep {
            op: op.to_string(),
            depth,
            gas,
            gas_cost,
            ..Default::default()
        }
    }

    fn tagged(mut step: RawStep, call_type: &str, to: &str, gas_limit: u64) -> RawStep {
        step.call_type = Some(call_type.to_string());
        step.to = Some(to.to_string());
        step.gas_limit = Some(gas_limit);
        step
    }

    const CALLEE: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn test_single_call_produces_two_frames() {
        let steps = vec![
            step("PUSH1", 0, 10_000, 3),
            step("CALL", 0, 9_997, 5_100),
            tagged(step("SLOAD", 1, 5_000, 2_100), "CALL", CALLEE, 5_000),
            step("RETURN", 1, 2_900, 0),
            step("STOP", 0, 7_797, 0),
        ];

        let trace = build("0xabc", &steps).unwrap();
        assert_eq!(trace.frames.len(), 2);

        let root = &trace.frames[0];
        let child = &trace.frames[1];
        assert_eq!(root.depth, 0);
        assert_eq!(child.depth, 1);
        assert_eq!(child.call_type, CallType::Call);
        assert_eq!(child.to.as_deref(), Some(CALLEE));

        assert_eq!(root.opcodes.total, 3);
        assert_eq!(root.opcodes.calls, 1);
        assert_eq!(child.opcodes.total, 2);
        assert_eq!(child.opcodes.sloads, 1);

        assert_eq!(child.gas_limit, 5_000);
        assert_eq!(child.gas_used, 5_000 - 2_900);
        assert_eq!(root.gas_used, 10_000 - 7_797);
        assert_eq!(trace.total_gas_used, root.gas_used);
        assert!(trace.error.is_none());
    }

    #[test]
    fn test_geth_depths_and_inferred_call_type() {
        // Plain struct logs: depth starts at 1 and frames carry no tags.
        let steps = vec![
            step("PUSH1", 1, 10_000, 3),
            step("DELEGATECALL", 1, 9_997, 4_000),
            step("SSTORE", 2, 3_900, 2_900),
            step("LOG1", 2, 1_000, 750),
            step("STOP", 2, 250, 0),
            step("STOP", 1, 6_147, 0),
        ];

        let trace = build("0xabc", &steps).unwrap();
        assert_eq!(trace.frames.len(), 2);
        let child = &trace.frames[1];
        assert_eq!(child.call_type, CallType::DelegateCall);
        assert_eq!(child.gas_limit, 3_900);
        assert_eq!(child.gas_used, 3_900 - 250);
        assert_eq!(child.opcodes.sstores, 1);
        assert_eq!(child.opcodes.logs, 1);
        assert_eq!(trace.total_gas_used, 10_000 - 6_147);
    }

    #[test]
    fn test_reverted_child_records_error() {
        let steps = vec![
            step("STATICCALL", 0, 10_000, 3_000),
            step("PUSH1", 1, 3_000, 3),
            step("REVERT", 1, 2_997, 0),
            step("POP", 0, 9_997, 2),
            step("STOP", 0, 9_995, 0),
        ];

        let trace = build("0xabc", &steps).unwrap();
        let child = &trace.frames[1];
        assert_eq!(child.opcodes.reverts, 1);
        assert_eq!(child.error.as_deref(), Some("execution reverted"));
        assert!(trace.frames[0].error.is_none());
        assert!(trace.error.is_none());
    }

    #[test]
    fn test_out_of_gas_is_recorded() {
        let mut last = step("SSTORE", 0, 100, 20_000);
        last.error = Some("out of gas".to_string());
        let trace = build("0xabc", &[step("PUSH1", 0, 103, 3), last]).unwrap();

        assert_eq!(trace.error.as_deref(), Some("out of gas"));
        assert_eq!(trace.frames[0].error.as_deref(), Some("out of gas"));
    }

    #[test]
    fn test_nested_frames_stay_in_pre_order() {
        let steps = vec![
            step("CALL", 0, 100_000, 50_000),
            step("CALL", 1, 50_000, 20_000),
            step("CREATE", 2, 20_000, 10_000),
            step("STOP", 3, 10_000, 0),
            step("STOP", 2, 19_000, 0),
            step("STOP", 1, 45_000, 0),
            step("CALL", 0, 95_000, 10_000),
            step("STOP", 1, 10_000, 0),
            step("STOP", 0, 94_000, 0),
        ];

        let trace = build("0xabc", &steps).unwrap();
        let depths: Vec<_> = trace.frames.iter().map(|f| f.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 3, 1]);
        assert_eq!(trace.frames[3].call_type, CallType::Create);
    }

    #[test]
    fn test_empty_stream_is_a_bare_root() {
        let root = RootContext {
            from: Some(format!("0x{}", "11".repeat(20))),
            to: Some(CALLEE.to_string()),
            gas_limit: Some(21_000),
            ..Default::default()
        };
        let trace = TraceBuilder::new("0xabc")
            .with_root(root)
            .build_from_steps(&[])
            .unwrap();

        assert_eq!(trace.frames.len(), 1);
        assert_eq!(trace.total_gas_used, 0);
        assert_eq!(trace.frames[0].gas_limit, 21_000);
    }

    #[test]
    fn test_child_inherits_parent_address_as_sender() {
        let root = RootContext {
            to: Some(CALLEE.to_string()),
            ..Default::default()
        };
        let steps = vec![
            step("CALL", 0, 10_000, 5_000),
            step("STOP", 1, 5_000, 0),
        ];
        let trace = TraceBuilder::new("0xabc")
            .with_root(root)
            .build_from_steps(&steps)
            .unwrap();
        assert_eq!(trace.frames[1].from.as_deref(), Some(CALLEE));
    }

    #[test]
    fn test_malformed_streams() {
        let jump = vec![step("CALL", 0, 100, 3), step("STOP", 2, 50, 0)];
        assert_eq!(
            build("0xabc", &jump).unwrap_err(),
            TraceMalformedError::DepthJump {
                step: 1,
                from: 0,
                to: 2
            }
        );

        let below = vec![step("PUSH1", 1, 100, 3), step("STOP", 0, 97, 0)];
        assert_eq!(
            build("0xabc", &below).unwrap_err(),
            TraceMalformedError::PopBelowRoot { step: 1, depth: 0 }
        );

        let untyped = vec![step("PUSH1", 0, 100, 3), step("STOP", 1, 50, 0)];
        assert_eq!(
            build("0xabc", &untyped).unwrap_err(),
            TraceMalformedError::UnknownCallType { step: 1 }
        );

        assert_eq!(
            build("0xabc", &[step("STOP", 3, 100, 0)]).unwrap_err(),
            TraceMalformedError::BadRootDepth(3)
        );
    }

    fn depth_sequence() -> impl Strategy<Value = Vec<u64>> {
        proptest::collection::vec(any::<bool>(), 0..64).prop_map(|moves| {
            let mut depth = 0u64;
            let mut depths = vec![0];
            for deeper in moves {
                if deeper {
                    depth += 1;
                } else {
                    depth = depth.saturating_sub(1);
                }
                depths.push(depth);
            }
            depths
        })
    }

    fn assert_pre_order(trace: &Trace) {
        assert_eq!(trace.frames[0].depth, 0);
        for pair in trace.frames.windows(2) {
            assert!(pair[1].depth >= 1);
            assert!(pair[1].depth <= pair[0].depth + 1);
        }
    }

    proptest! {
        #[test]
        fn prop_frames_are_pre_order(depths in depth_sequence()) {
            let steps: Vec<_> = depths
                .iter()
                .map(|d| {
                    let mut s = step("CALL", *d, 1_000_000, 1);
                    s.call_type = Some("CALL".to_string());
                    s
                })
                .collect();
            let pushes = depths.windows(2).filter(|w| w[1] > w[0]).count();

            let trace = build("0xabc", &steps).unwrap();
            prop_assert_eq!(trace.frames.len(), 1 + pushes);
            assert_pre_order(&trace);
            for frame in &trace.frames {
                prop_assert!(frame.gas_used <= frame.gas_limit);
            }
        }

        #[test]
        fn prop_depth_jumps_are_rejected(jump in 2u64..8) {
            let steps = vec![step("CALL", 0, 100, 1), step("STOP", jump, 50, 0)];
            prop_assert!(
                matches!(
                    build("0xabc", &steps),
                    Err(TraceMalformedError::DepthJump { .. })
                ),
                "jump should be rejected"
            );
        }
    }
}
