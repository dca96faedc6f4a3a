use crate::bytecode::{Op, ProgramBc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stack-check error: {op} at {address:04} needs {needed} values, only {available} guaranteed")]
pub struct StackCheckError {
    pub address: usize,
    pub op: &'static str,
    pub needed: u32,
    pub available: u32,
}

/// Check that no reachable op can pop more than the stack is guaranteed to
/// hold, starting from an empty stack at op 0.
///
/// Tracks the minimum height on entry to each op over every path through the
/// control-flow graph. Return sites are reached through the dispatcher, which
/// is treated as flowing to all of them, so a subroutine called at different
/// heights can produce a report for a program that never underflows.
pub fn check(bc: &ProgramBc) -> Result<(), StackCheckError> {
    check_ops(&bc.main.ops)
}

pub fn check_ops(ops: &[Op]) -> Result<(), StackCheckError> {
    let mut min_height: Vec<Option<u32>> = vec![None; ops.len()];
    let mut worklist = Vec::new();

    if !ops.is_empty() {
        min_height[0] = Some(0);
        worklist.push(0);
    }

    while let Some(ip) = worklist.pop() {
        let Some(height) = min_height[ip] else {
            continue;
        };
        let op = &ops[ip];
        let (pops, pushes) = op.effect();

        if height < pops {
            return Err(StackCheckError {
                address: ip,
                op: op.name(),
                needed: pops,
                available: height,
            });
        }
        let out = height - pops + pushes;

        for next in successors(op, ip) {
            // Out-of-range targets are left for the VM to report.
            let Some(slot) = usize::try_from(next).ok().and_then(|n| min_height.get_mut(n)) else {
                continue;
            };
            if slot.is_none_or(|h| out < h) {
                *slot = Some(out);
                worklist.push(next as usize);
            }
        }
    }

    Ok(())
}

fn successors(op: &Op, ip: usize) -> Vec<i64> {
    let ip = ip as i64;
    let mut next = Vec::new();

    if op.falls_through() {
        next.push(ip + 1);
    }
    if let Some(offset) = op.branch_offset() {
        next.push(ip + offset as i64);
    }
    if let Op::Dispatch(table) = op {
        next.extend(table.iter().map(|&offset| ip + offset as i64));
    }

    next
}
