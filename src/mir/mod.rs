//! The memory IR: a control-flow graph of blocks over scratch slots and
//! frame slots, with every op carrying a deterministic stack effect.

pub mod lower;

use crate::source::SourceLocation;
use crate::wtypes::AvmType;

/// An audit record of a named value entering or leaving the stack domain.
/// The flat sequence of these across a program must survive optimization
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackManipulation {
    Define { name: String },
    Drop { name: String },
}

/// A subroutine signature as carried through lowering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<(String, AvmType)>,
    pub returns: Vec<AvmType>,
}

/// A lowered program: `main` plus the subroutines it can call
#[derive(Debug, Clone)]
pub struct Program {
    pub id: String,
    pub main: Subroutine,
    pub subroutines: Vec<Subroutine>,
}

impl Program {
    pub fn all_subroutines(&self) -> impl Iterator<Item = &Subroutine> {
        std::iter::once(&self.main).chain(self.subroutines.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Subroutine {
    pub is_main: bool,
    pub signature: Signature,
    pub blocks: Vec<Block>,
}

/// A basic block; terminators are ordinary ops (the last op of a block)
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub ops: Vec<Op>,
    pub entry_stack_height: usize,
    pub exit_stack_height: usize,
    /// names of values carried across the block boundary on the stack
    pub x_stack_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub kind: OpKind,
    pub stack_manipulations: Vec<StackManipulation>,
    pub loc: Option<SourceLocation>,
}

impl Op {
    pub fn new(kind: OpKind, loc: Option<SourceLocation>) -> Self {
        Self {
            kind,
            stack_manipulations: vec![],
            loc,
        }
    }

    pub fn with_manipulations(
        kind: OpKind,
        stack_manipulations: Vec<StackManipulation>,
        loc: Option<SourceLocation>,
    ) -> Self {
        Self {
            kind,
            stack_manipulations,
            loc,
        }
    }

    /// (values consumed, values produced)
    pub fn stack_effect(&self) -> (usize, usize) {
        match &self.kind {
            OpKind::PushInt(_) | OpKind::PushBytes(_) | OpKind::PushTemplateVar { .. } => (0, 1),
            OpKind::Intrinsic {
                consumes, produces, ..
            } => (*consumes, *produces),
            OpKind::LoadParam { .. } | OpKind::LoadLocal { .. } => (0, 1),
            OpKind::StoreParam { .. } | OpKind::StoreLocal { .. } => (1, 0),
            OpKind::Branch { .. } => (0, 0),
            OpKind::BranchNonZero { .. } | OpKind::BranchZero { .. } | OpKind::Switch { .. } => {
                (1, 0)
            }
            OpKind::CallSub {
                consumes, produces, ..
            } => (*consumes, *produces),
            OpKind::RetSub { returns } => (*returns, 0),
            OpKind::Proto { .. } => (0, 0),
        }
    }

    /// Labels this op can transfer control to
    pub fn branch_targets(&self) -> Vec<&str> {
        match &self.kind {
            OpKind::Branch { target }
            | OpKind::BranchNonZero { target }
            | OpKind::BranchZero { target } => vec![target],
            OpKind::Switch { targets } => targets.iter().map(String::as_str).collect(),
            _ => vec![],
        }
    }

    /// Whether control never falls through past this op
    pub fn is_terminal(&self) -> bool {
        match &self.kind {
            OpKind::Branch { .. } | OpKind::RetSub { .. } => true,
            OpKind::Intrinsic { op, .. } => matches!(op.as_str(), "return" | "err"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    PushInt(u64),
    PushBytes(Vec<u8>),
    PushTemplateVar {
        name: String,
        atype: AvmType,
    },
    /// a direct AVM op with integer immediates and a fixed stack arity
    Intrinsic {
        op: String,
        immediates: Vec<u64>,
        consumes: usize,
        produces: usize,
    },
    /// read a subroutine parameter from the frame
    LoadParam {
        index: usize,
        total: usize,
    },
    StoreParam {
        index: usize,
        total: usize,
    },
    /// scratch-slot backed local variable access
    LoadLocal {
        slot: u8,
        name: String,
    },
    StoreLocal {
        slot: u8,
        name: String,
    },
    Branch {
        target: String,
    },
    BranchNonZero {
        target: String,
    },
    BranchZero {
        target: String,
    },
    Switch {
        targets: Vec<String>,
    },
    CallSub {
        target: String,
        consumes: usize,
        produces: usize,
    },
    RetSub {
        returns: usize,
    },
    Proto {
        args: usize,
        returns: usize,
    },
}
