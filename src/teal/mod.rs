//! The TEAL IR: the near-final stack representation, convertible to textual
//! TEAL and consumed by the assembler.

pub mod lower;
pub mod optimize;
pub mod stack;

use std::fmt;

use crate::error::InternalError;
use crate::mir::StackManipulation;
use crate::source::SourceLocation;

/// Sentinel for an unknown stack height
pub const UNKNOWN_HEIGHT: i64 = -1;

#[derive(Debug, Clone)]
pub struct TealProgram {
    pub id: String,
    pub target_avm_version: u64,
    pub main: TealSubroutine,
    pub subroutines: Vec<TealSubroutine>,
}

impl TealProgram {
    pub fn all_subroutines(&self) -> impl Iterator<Item = &TealSubroutine> {
        std::iter::once(&self.main).chain(self.subroutines.iter())
    }

    pub fn all_subroutines_mut(&mut self) -> impl Iterator<Item = &mut TealSubroutine> {
        std::iter::once(&mut self.main).chain(self.subroutines.iter_mut())
    }

    /// Every block label must be unique and every branch target must name a
    /// defined label
    pub fn validate_labels(&self) -> Result<(), InternalError> {
        let mut labels = std::collections::BTreeSet::new();
        for sub in self.all_subroutines() {
            for block in &sub.blocks {
                if !labels.insert(block.label.as_str()) {
                    return Err(InternalError::new(
                        format!("duplicate block label: {}", block.label),
                        None,
                    ));
                }
            }
        }
        for sub in self.all_subroutines() {
            for block in &sub.blocks {
                for op in &block.ops {
                    for target in op.kind.branch_targets() {
                        if !labels.contains(target) {
                            return Err(InternalError::new(
                                format!("branch to undefined label: {target}"),
                                op.loc,
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The flat sequence of stack manipulations, used to assert conservation
    /// across optimization
    pub fn stack_manipulations(&self) -> Vec<StackManipulation> {
        self.all_subroutines()
            .flat_map(|sub| &sub.blocks)
            .flat_map(|block| &block.ops)
            .flat_map(|op| op.stack_manipulations.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct TealSubroutine {
    pub is_main: bool,
    pub signature_name: String,
    pub blocks: Vec<TealBlock>,
}

#[derive(Debug, Clone)]
pub struct TealBlock {
    pub label: String,
    pub ops: Vec<TealOp>,
    /// names of values on the stack at block entry
    pub x_stack: Vec<String>,
    pub entry_stack_height: i64,
    pub exit_stack_height: i64,
}

impl TealBlock {
    /// Entry height plus the net effect of every op must equal the exit
    /// height
    pub fn validate(&self) -> Result<(), InternalError> {
        if self.entry_stack_height < 0 {
            return Err(InternalError::new(
                format!("block {} has unknown entry stack height", self.label),
                None,
            ));
        }
        let mut height = self.entry_stack_height;
        for op in &self.ops {
            height += op.kind.net_effect();
            if height < 0 {
                return Err(InternalError::new(
                    format!("stack underflow inside block {}", self.label),
                    op.loc,
                ));
            }
        }
        if self.exit_stack_height >= 0 && height != self.exit_stack_height {
            return Err(InternalError::new(
                format!(
                    "block {}: entry height {} with net effect does not reach exit height {} (got {})",
                    self.label, self.entry_stack_height, self.exit_stack_height, height
                ),
                None,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TealOp {
    pub kind: TealOpKind,
    pub stack_manipulations: Vec<StackManipulation>,
    pub loc: Option<SourceLocation>,
}

impl TealOp {
    pub fn new(kind: TealOpKind, loc: Option<SourceLocation>) -> Self {
        Self {
            kind,
            stack_manipulations: vec![],
            loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TealOpKind {
    PushInt(u64),
    PushBytes(Vec<u8>),
    PushInts(Vec<u64>),
    PushBytess(Vec<Vec<u8>>),
    IntcBlock(Vec<u64>),
    BytecBlock(Vec<Vec<u8>>),
    Intc(u8),
    Bytec(u8),
    /// `int TMPL_*`, substituted at assembly time
    TemplateInt(String),
    /// `byte TMPL_*`, substituted at assembly time
    TemplateBytes(String),
    Intrinsic {
        op: String,
        immediates: Vec<u64>,
        consumes: usize,
        produces: usize,
    },
    Load(u8),
    Store(u8),
    FrameDig(i8),
    FrameBury(i8),
    Proto {
        args: u8,
        returns: u8,
    },
    Branch(String),
    BranchNonZero(String),
    BranchZero(String),
    Switch(Vec<String>),
    CallSub {
        target: String,
        consumes: usize,
        produces: usize,
    },
    RetSub {
        returns: usize,
    },
}

impl TealOpKind {
    /// Net stack effect (produced minus consumed)
    pub fn net_effect(&self) -> i64 {
        match self {
            Self::PushInt(_)
            | Self::PushBytes(_)
            | Self::Intc(_)
            | Self::Bytec(_)
            | Self::TemplateInt(_)
            | Self::TemplateBytes(_)
            | Self::Load(_)
            | Self::FrameDig(_) => 1,
            Self::PushInts(values) => values.len() as i64,
            Self::PushBytess(values) => values.len() as i64,
            Self::IntcBlock(_) | Self::BytecBlock(_) | Self::Proto { .. } => 0,
            Self::Intrinsic {
                consumes, produces, ..
            } => *produces as i64 - *consumes as i64,
            Self::Store(_) | Self::FrameBury(_) => -1,
            Self::Branch(_) => 0,
            Self::BranchNonZero(_) | Self::BranchZero(_) | Self::Switch(_) => -1,
            Self::CallSub {
                consumes, produces, ..
            } => *produces as i64 - *consumes as i64,
            Self::RetSub { returns } => -(*returns as i64),
        }
    }

    pub fn branch_targets(&self) -> Vec<&str> {
        match self {
            Self::Branch(target) | Self::BranchNonZero(target) | Self::BranchZero(target) => {
                vec![target]
            }
            Self::Switch(targets) => targets.iter().map(String::as_str).collect(),
            Self::CallSub { target, .. } => vec![target],
            _ => vec![],
        }
    }

    /// Whether control never falls through past this op
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Branch(_) | Self::RetSub { .. } => true,
            Self::Intrinsic { op, .. } => matches!(op.as_str(), "return" | "err"),
            _ => false,
        }
    }

    /// Whether this op pushes a single value with no side effects (safe to
    /// cancel against a following `pop`)
    pub fn is_pure_push(&self) -> bool {
        match self {
            Self::PushInt(_)
            | Self::PushBytes(_)
            | Self::Intc(_)
            | Self::Bytec(_)
            | Self::Load(_)
            | Self::FrameDig(_) => true,
            Self::Intrinsic { op, .. } => op == "dup",
            _ => false,
        }
    }
}

fn render_bytes(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("\"{}\"", String::from_utf8_lossy(bytes))
    } else {
        format!("0x{}", hex::encode(bytes))
    }
}

impl fmt::Display for TealOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushInt(value) => write!(f, "pushint {value}"),
            Self::PushBytes(bytes) => write!(f, "pushbytes {}", render_bytes(bytes)),
            Self::PushInts(values) => {
                write!(f, "pushints")?;
                for value in values {
                    write!(f, " {value}")?;
                }
                Ok(())
            }
            Self::PushBytess(values) => {
                write!(f, "pushbytess")?;
                for bytes in values {
                    write!(f, " {}", render_bytes(bytes))?;
                }
                Ok(())
            }
            Self::IntcBlock(values) => {
                write!(f, "intcblock")?;
                for value in values {
                    write!(f, " {value}")?;
                }
                Ok(())
            }
            Self::BytecBlock(values) => {
                write!(f, "bytecblock")?;
                for bytes in values {
                    write!(f, " {}", render_bytes(bytes))?;
                }
                Ok(())
            }
            Self::Intc(index) if *index <= 3 => write!(f, "intc_{index}"),
            Self::Intc(index) => write!(f, "intc {index}"),
            Self::Bytec(index) if *index <= 3 => write!(f, "bytec_{index}"),
            Self::Bytec(index) => write!(f, "bytec {index}"),
            Self::TemplateInt(name) => write!(f, "int TMPL_{name}"),
            Self::TemplateBytes(name) => write!(f, "byte TMPL_{name}"),
            Self::Intrinsic { op, immediates, .. } => {
                write!(f, "{op}")?;
                for imm in immediates {
                    write!(f, " {imm}")?;
                }
                Ok(())
            }
            Self::Load(slot) => write!(f, "load {slot}"),
            Self::Store(slot) => write!(f, "store {slot}"),
            Self::FrameDig(index) => write!(f, "frame_dig {index}"),
            Self::FrameBury(index) => write!(f, "frame_bury {index}"),
            Self::Proto { args, returns } => write!(f, "proto {args} {returns}"),
            Self::Branch(target) => write!(f, "b {target}"),
            Self::BranchNonZero(target) => write!(f, "bnz {target}"),
            Self::BranchZero(target) => write!(f, "bz {target}"),
            Self::Switch(targets) => {
                write!(f, "switch")?;
                for target in targets {
                    write!(f, " {target}")?;
                }
                Ok(())
            }
            Self::CallSub { target, .. } => write!(f, "callsub {target}"),
            Self::RetSub { .. } => write!(f, "retsub"),
        }
    }
}

impl fmt::Display for TealProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#pragma version {}", self.target_avm_version)?;
        for sub in self.all_subroutines() {
            for block in &sub.blocks {
                writeln!(f, "\n{}:", block.label)?;
                for op in &block.ops {
                    writeln!(f, "    {}", op.kind)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_height_validation() {
        let block = TealBlock {
            label: "main".into(),
            ops: vec![
                TealOp::new(TealOpKind::PushInt(1), None),
                TealOp::new(TealOpKind::PushInt(2), None),
                TealOp::new(
                    TealOpKind::Intrinsic {
                        op: "+".into(),
                        immediates: vec![],
                        consumes: 2,
                        produces: 1,
                    },
                    None,
                ),
            ],
            x_stack: vec![],
            entry_stack_height: 0,
            exit_stack_height: 1,
        };
        assert!(block.validate().is_ok());

        let broken = TealBlock {
            exit_stack_height: 0,
            ..block
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_underflow_is_detected() {
        let block = TealBlock {
            label: "main".into(),
            ops: vec![TealOp::new(
                TealOpKind::Intrinsic {
                    op: "pop".into(),
                    immediates: vec![],
                    consumes: 1,
                    produces: 0,
                },
                None,
            )],
            x_stack: vec![],
            entry_stack_height: 0,
            exit_stack_height: UNKNOWN_HEIGHT,
        };
        assert!(block.validate().is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let block = |label: &str| TealBlock {
            label: label.into(),
            ops: vec![],
            x_stack: vec![],
            entry_stack_height: 0,
            exit_stack_height: 0,
        };
        let program = TealProgram {
            id: "t".into(),
            target_avm_version: 10,
            main: TealSubroutine {
                is_main: true,
                signature_name: "main".into(),
                blocks: vec![block("main"), block("main")],
            },
            subroutines: vec![],
        };
        assert!(program.validate_labels().is_err());
    }

    #[test]
    fn test_branch_to_missing_label_rejected() {
        let program = TealProgram {
            id: "t".into(),
            target_avm_version: 10,
            main: TealSubroutine {
                is_main: true,
                signature_name: "main".into(),
                blocks: vec![TealBlock {
                    label: "main".into(),
                    ops: vec![TealOp::new(TealOpKind::Branch("nowhere".into()), None)],
                    x_stack: vec![],
                    entry_stack_height: 0,
                    exit_stack_height: 0,
                }],
            },
            subroutines: vec![],
        };
        assert!(program.validate_labels().is_err());
    }

    #[test]
    fn test_display_renders_teal_text() {
        let op = TealOpKind::PushBytes(vec![0xFF, 0xF0]);
        assert_eq!(op.to_string(), "pushbytes 0xfff0");
        assert_eq!(TealOpKind::Intc(2).to_string(), "intc_2");
        assert_eq!(TealOpKind::Intc(9).to_string(), "intc 9");
        assert_eq!(
            TealOpKind::TemplateInt("FEE".into()).to_string(),
            "int TMPL_FEE"
        );
    }
}
