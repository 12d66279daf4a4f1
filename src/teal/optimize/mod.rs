//! TEAL optimization passes.
//!
//! All passes preserve the stack-manipulation audit trail: when an op is
//! removed, its manipulations move to a neighbouring op. The pipeline
//! asserts conservation after the optimizer runs.

pub mod combine_pushes;
pub mod constant_block;

use tracing::debug;

use super::{TealBlock, TealOp, TealOpKind, TealProgram};

/// Run the peephole passes to fixpoint on every subroutine
pub fn optimize_teal_program(program: &mut TealProgram) {
    let mut rounds = 0usize;
    for sub in program.all_subroutines_mut() {
        for block in &mut sub.blocks {
            loop {
                let mut changed = false;
                changed |= remove_dead_code(block);
                changed |= cancel_pure_push_pop(block);
                changed |= fold_constants(block);
                changed |= cancel_rotations(block);
                if !changed {
                    break;
                }
                rounds += 1;
            }
        }
    }
    debug!(target: "avmc::teal", rounds, "peephole optimization finished");
}

/// Remove ops from `block` at the given (sorted) indices, moving their
/// manipulations onto the previous surviving op, or the next one when
/// removing from the front. Declines (returning false) when nothing would
/// survive to carry a non-empty audit trail.
fn remove_ops(block: &mut TealBlock, indices: &[usize]) -> bool {
    if indices.len() == block.ops.len()
        && block
            .ops
            .iter()
            .any(|op| !op.stack_manipulations.is_empty())
    {
        return false;
    }
    for &idx in indices.iter().rev() {
        let removed = block.ops.remove(idx);
        if removed.stack_manipulations.is_empty() {
            continue;
        }
        if idx > 0 {
            block.ops[idx - 1]
                .stack_manipulations
                .extend(removed.stack_manipulations);
        } else if let Some(next) = block.ops.first_mut() {
            let mut manipulations = removed.stack_manipulations;
            manipulations.extend(std::mem::take(&mut next.stack_manipulations));
            next.stack_manipulations = manipulations;
        }
    }
    true
}

/// Everything after the first terminal op in a block is unreachable
fn remove_dead_code(block: &mut TealBlock) -> bool {
    let Some(first_terminal) = block.ops.iter().position(|op| op.kind.is_terminal()) else {
        return false;
    };
    if first_terminal + 1 >= block.ops.len() {
        return false;
    }
    let indices: Vec<usize> = (first_terminal + 1..block.ops.len()).collect();
    remove_ops(block, &indices)
}

/// A side-effect-free push immediately consumed by `pop` cancels out
fn cancel_pure_push_pop(block: &mut TealBlock) -> bool {
    for idx in 0..block.ops.len().saturating_sub(1) {
        let is_pop = matches!(
            &block.ops[idx + 1].kind,
            TealOpKind::Intrinsic { op, .. } if op == "pop"
        );
        if is_pop
            && block.ops[idx].kind.is_pure_push()
            && remove_ops(block, &[idx, idx + 1])
        {
            return true;
        }
    }
    false
}

/// Fold `pushint a; pushint b; <binop>` when the result is AVM-legal
fn fold_constants(block: &mut TealBlock) -> bool {
    for idx in 0..block.ops.len().saturating_sub(2) {
        let (TealOpKind::PushInt(a), TealOpKind::PushInt(b)) =
            (&block.ops[idx].kind, &block.ops[idx + 1].kind)
        else {
            continue;
        };
        let TealOpKind::Intrinsic { op, .. } = &block.ops[idx + 2].kind else {
            continue;
        };
        let Some(folded) = fold_binary(*a, *b, op) else {
            continue;
        };
        let mut manipulations = Vec::new();
        for op in &mut block.ops[idx..idx + 3] {
            manipulations.extend(std::mem::take(&mut op.stack_manipulations));
        }
        let loc = block.ops[idx].loc;
        block.ops.splice(
            idx..idx + 3,
            [TealOp {
                kind: TealOpKind::PushInt(folded),
                stack_manipulations: manipulations,
                loc,
            }],
        );
        return true;
    }
    false
}

/// Fold a uint64 binary op the way the AVM would, declining anything that
/// would fail at runtime
fn fold_binary(a: u64, b: u64, op: &str) -> Option<u64> {
    match op {
        "+" => a.checked_add(b),
        "-" => a.checked_sub(b),
        "*" => a.checked_mul(b),
        "/" => a.checked_div(b),
        "%" => a.checked_rem(b),
        "|" => Some(a | b),
        "&" => Some(a & b),
        "^" => Some(a ^ b),
        "==" => Some(u64::from(a == b)),
        "!=" => Some(u64::from(a != b)),
        "<" => Some(u64::from(a < b)),
        "<=" => Some(u64::from(a <= b)),
        ">" => Some(u64::from(a > b)),
        ">=" => Some(u64::from(a >= b)),
        "&&" => Some(u64::from(a != 0 && b != 0)),
        "||" => Some(u64::from(a != 0 || b != 0)),
        "shl" => (b < 64).then(|| a << b),
        "shr" => (b < 64).then(|| a >> b),
        _ => None,
    }
}

/// `swap; swap` and zero-distance `cover`/`uncover` do nothing
fn cancel_rotations(block: &mut TealBlock) -> bool {
    for idx in 0..block.ops.len() {
        if let TealOpKind::Intrinsic { op, immediates, .. } = &block.ops[idx].kind
            && matches!(op.as_str(), "cover" | "uncover")
            && immediates == &vec![0]
            && remove_ops(block, &[idx])
        {
            return true;
        }
        if idx + 1 < block.ops.len() {
            let both_swap = [idx, idx + 1].iter().all(|i| {
                matches!(
                    &block.ops[*i].kind,
                    TealOpKind::Intrinsic { op, .. } if op == "swap"
                )
            });
            if both_swap && remove_ops(block, &[idx, idx + 1]) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::StackManipulation;

    fn block(ops: Vec<TealOp>) -> TealBlock {
        TealBlock {
            label: "test".into(),
            ops,
            x_stack: vec![],
            entry_stack_height: 0,
            exit_stack_height: super::super::UNKNOWN_HEIGHT,
        }
    }

    fn intrinsic(op: &str, consumes: usize, produces: usize) -> TealOp {
        TealOp::new(
            TealOpKind::Intrinsic {
                op: op.into(),
                immediates: vec![],
                consumes,
                produces,
            },
            None,
        )
    }

    #[test]
    fn test_dead_code_after_terminal_is_removed() {
        let mut b = block(vec![
            intrinsic("err", 0, 0),
            TealOp::new(TealOpKind::PushInt(1), None),
        ]);
        assert!(remove_dead_code(&mut b));
        assert_eq!(b.ops.len(), 1);
    }

    #[test]
    fn test_push_pop_cancellation_keeps_manipulations() {
        let mut push = TealOp::new(TealOpKind::PushInt(1), None);
        push.stack_manipulations = vec![StackManipulation::Define { name: "x".into() }];
        let mut b = block(vec![
            TealOp::new(TealOpKind::PushInt(7), None),
            push,
            intrinsic("pop", 1, 0),
        ]);
        assert!(cancel_pure_push_pop(&mut b));
        assert_eq!(b.ops.len(), 1);
        // the audit record moved onto the surviving op
        assert_eq!(
            b.ops[0].stack_manipulations,
            vec![StackManipulation::Define { name: "x".into() }]
        );
    }

    #[test]
    fn test_constant_folding() {
        let mut b = block(vec![
            TealOp::new(TealOpKind::PushInt(6), None),
            TealOp::new(TealOpKind::PushInt(7), None),
            intrinsic("*", 2, 1),
        ]);
        assert!(fold_constants(&mut b));
        assert_eq!(b.ops.len(), 1);
        assert_eq!(b.ops[0].kind, TealOpKind::PushInt(42));
    }

    #[test]
    fn test_no_fold_on_division_by_zero() {
        let mut b = block(vec![
            TealOp::new(TealOpKind::PushInt(6), None),
            TealOp::new(TealOpKind::PushInt(0), None),
            intrinsic("/", 2, 1),
        ]);
        assert!(!fold_constants(&mut b));
        assert_eq!(b.ops.len(), 3);
    }

    #[test]
    fn test_no_fold_on_overflow() {
        let mut b = block(vec![
            TealOp::new(TealOpKind::PushInt(u64::MAX), None),
            TealOp::new(TealOpKind::PushInt(1), None),
            intrinsic("+", 2, 1),
        ]);
        assert!(!fold_constants(&mut b));
    }

    #[test]
    fn test_double_swap_cancels() {
        let mut b = block(vec![
            TealOp::new(TealOpKind::PushInt(1), None),
            intrinsic("swap", 2, 2),
            intrinsic("swap", 2, 2),
        ]);
        assert!(cancel_rotations(&mut b));
        assert_eq!(b.ops.len(), 1);
    }
}
