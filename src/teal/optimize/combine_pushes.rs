//! Merge adjacent push ops into their multi-value forms: runs of `pushint`
//! become one `pushints`, runs of `pushbytes` one `pushbytess`.

use super::super::{TealOp, TealOpKind, TealProgram};

pub fn combine_pushes(program: &mut TealProgram) {
    for sub in program.all_subroutines_mut() {
        for block in &mut sub.blocks {
            block.ops = combine(std::mem::take(&mut block.ops));
        }
    }
}

fn combine(ops: Vec<TealOp>) -> Vec<TealOp> {
    let mut result: Vec<TealOp> = Vec::with_capacity(ops.len());
    for op in ops {
        match (&op.kind, result.last_mut()) {
            (TealOpKind::PushInt(value), Some(last)) => match &mut last.kind {
                TealOpKind::PushInt(prev) => {
                    last.kind = TealOpKind::PushInts(vec![*prev, *value]);
                    last.stack_manipulations.extend(op.stack_manipulations);
                }
                TealOpKind::PushInts(values) => {
                    values.push(*value);
                    last.stack_manipulations.extend(op.stack_manipulations);
                }
                _ => result.push(op),
            },
            (TealOpKind::PushBytes(value), Some(last)) => match &mut last.kind {
                TealOpKind::PushBytes(prev) => {
                    last.kind = TealOpKind::PushBytess(vec![prev.clone(), value.clone()]);
                    last.stack_manipulations.extend(op.stack_manipulations);
                }
                TealOpKind::PushBytess(values) => {
                    values.push(value.clone());
                    last.stack_manipulations.extend(op.stack_manipulations);
                }
                _ => result.push(op),
            },
            _ => result.push(op),
        }
    }
    result
}
