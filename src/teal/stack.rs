//! Stack simulation used while lowering MIR ops into TEAL ops.
//!
//! Each MIR op maps to zero or more TEAL ops; the simulation tracks the
//! execution-stack height so blocks can record entry and exit heights, and
//! carries the stack-manipulation audit records across unchanged.

use crate::error::InternalError;
use crate::mir;

use super::{TealOp, TealOpKind};

#[derive(Debug, Default)]
pub struct Stack {
    height: i64,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_block(&mut self, block: &mir::Block) {
        self.height = block.entry_stack_height as i64;
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// Lower one MIR op, updating the simulated height
    pub fn lower_op(&mut self, op: &mir::Op) -> Result<Vec<TealOp>, InternalError> {
        let kind = match &op.kind {
            mir::OpKind::PushInt(value) => TealOpKind::PushInt(*value),
            mir::OpKind::PushBytes(value) => TealOpKind::PushBytes(value.clone()),
            mir::OpKind::PushTemplateVar { name, atype } => match atype {
                crate::wtypes::AvmType::Uint64 => TealOpKind::TemplateInt(name.clone()),
                crate::wtypes::AvmType::Bytes => TealOpKind::TemplateBytes(name.clone()),
            },
            mir::OpKind::Intrinsic {
                op: op_code,
                immediates,
                consumes,
                produces,
            } => TealOpKind::Intrinsic {
                op: op_code.clone(),
                immediates: immediates.clone(),
                consumes: *consumes,
                produces: *produces,
            },
            mir::OpKind::LoadParam { index, total } => {
                TealOpKind::FrameDig(frame_index(*index, *total, op)?)
            }
            mir::OpKind::StoreParam { index, total } => {
                TealOpKind::FrameBury(frame_index(*index, *total, op)?)
            }
            mir::OpKind::LoadLocal { slot, .. } => TealOpKind::Load(*slot),
            mir::OpKind::StoreLocal { slot, .. } => TealOpKind::Store(*slot),
            mir::OpKind::Branch { target } => TealOpKind::Branch(target.clone()),
            mir::OpKind::BranchNonZero { target } => TealOpKind::BranchNonZero(target.clone()),
            mir::OpKind::BranchZero { target } => TealOpKind::BranchZero(target.clone()),
            mir::OpKind::Switch { targets } => TealOpKind::Switch(targets.clone()),
            mir::OpKind::CallSub {
                target,
                consumes,
                produces,
            } => TealOpKind::CallSub {
                target: target.clone(),
                consumes: *consumes,
                produces: *produces,
            },
            mir::OpKind::RetSub { returns } => TealOpKind::RetSub { returns: *returns },
            mir::OpKind::Proto { args, returns } => TealOpKind::Proto {
                args: *args as u8,
                returns: *returns as u8,
            },
        };
        self.height += kind.net_effect();
        if self.height < 0 {
            return Err(InternalError::new(
                "stack simulation went negative during TEAL lowering",
                op.loc,
            ));
        }
        Ok(vec![TealOp {
            kind,
            stack_manipulations: op.stack_manipulations.clone(),
            loc: op.loc,
        }])
    }
}

/// Subroutine arguments sit below the frame pointer
fn frame_index(index: usize, total: usize, op: &mir::Op) -> Result<i8, InternalError> {
    let relative = index as i64 - total as i64;
    i8::try_from(relative)
        .map_err(|_| InternalError::new("frame index out of range", op.loc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{Op, OpKind};

    #[test]
    fn test_param_access_is_frame_relative() {
        let mut stack = Stack::new();
        let load = Op::new(OpKind::LoadParam { index: 0, total: 2 }, None);
        let ops = stack.lower_op(&load).unwrap();
        assert_eq!(ops[0].kind, TealOpKind::FrameDig(-2));
        assert_eq!(stack.height(), 1);
    }

    #[test]
    fn test_locals_use_scratch() {
        let mut stack = Stack::new();
        stack
            .lower_op(&Op::new(OpKind::PushInt(1), None))
            .unwrap();
        let store = Op::new(
            OpKind::StoreLocal {
                slot: 3,
                name: "x".into(),
            },
            None,
        );
        let ops = stack.lower_op(&store).unwrap();
        assert_eq!(ops[0].kind, TealOpKind::Store(3));
        assert_eq!(stack.height(), 0);
    }

    #[test]
    fn test_underflow_is_an_internal_error() {
        let mut stack = Stack::new();
        let pop = Op::new(
            OpKind::Intrinsic {
                op: "pop".into(),
                immediates: vec![],
                consumes: 1,
                produces: 0,
            },
            None,
        );
        assert!(stack.lower_op(&pop).is_err());
    }
}
