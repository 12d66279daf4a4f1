//! Bytecode assembly: opcode encoding, two-pass label resolution, and
//! template-variable substitution.
//!
//! Branch operands are signed 16-bit offsets relative to the program counter
//! after the full instruction has been read. Forward references are emitted
//! as placeholders and patched once every label's offset is known.

pub mod context;
pub mod ops;

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::options::TemplateValue;
use crate::teal::{TealOpKind, TealProgram};
use crate::varuint::encode_varuint;

pub use context::{AssembleContext, Event};
use ops::*;

/// Assemble a validated TEAL program into AVM bytecode
pub fn assemble_program(
    ctx: &mut AssembleContext,
    program: &TealProgram,
) -> CompileResult<Vec<u8>> {
    let mut assembler = Assembler::default();
    let mut bytecode = encode_varuint(program.target_avm_version);

    for sub in program.all_subroutines() {
        for block in &sub.blocks {
            assembler
                .labels
                .insert(block.label.clone(), bytecode.len());
            for op in &block.ops {
                ctx.events.insert(
                    bytecode.len(),
                    Event {
                        subroutine: sub.signature_name.clone(),
                        block: block.label.clone(),
                        op: op.kind.to_string(),
                    },
                );
                assembler.assemble_op(ctx, &mut bytecode, &op.kind)?;
            }
        }
    }

    assembler.resolve_forward_refs(&mut bytecode)?;
    debug!(target: "avmc::assemble", id = %program.id, size = bytecode.len(), "assembled");
    Ok(bytecode)
}

#[derive(Debug, Default)]
struct Assembler {
    /// label to bytecode-offset mapping
    labels: HashMap<String, usize>,
    /// placeholder offsets still waiting for their label
    forward_refs: Vec<(usize, String)>,
    /// for switch placeholders, the pc their offsets are relative to
    switch_ends: HashMap<usize, usize>,
}

impl Assembler {
    fn assemble_op(
        &mut self,
        ctx: &AssembleContext,
        bytecode: &mut Vec<u8>,
        kind: &TealOpKind,
    ) -> CompileResult<()> {
        match kind {
            TealOpKind::PushInt(value) => {
                bytecode.push(OP_PUSHINT);
                bytecode.extend(encode_varuint(*value));
            }
            TealOpKind::PushBytes(value) => {
                bytecode.push(OP_PUSHBYTES);
                push_length_prefixed(bytecode, value);
            }
            TealOpKind::PushInts(values) => {
                bytecode.push(OP_PUSHINTS);
                bytecode.extend(encode_varuint(values.len() as u64));
                for value in values {
                    bytecode.extend(encode_varuint(*value));
                }
            }
            TealOpKind::PushBytess(values) => {
                bytecode.push(OP_PUSHBYTESS);
                bytecode.extend(encode_varuint(values.len() as u64));
                for value in values {
                    push_length_prefixed(bytecode, value);
                }
            }
            TealOpKind::IntcBlock(values) => {
                bytecode.push(OP_INTCBLOCK);
                bytecode.extend(encode_varuint(values.len() as u64));
                for value in values {
                    bytecode.extend(encode_varuint(*value));
                }
            }
            TealOpKind::BytecBlock(values) => {
                bytecode.push(OP_BYTECBLOCK);
                bytecode.extend(encode_varuint(values.len() as u64));
                for value in values {
                    push_length_prefixed(bytecode, value);
                }
            }
            TealOpKind::Intc(index) => match index {
                0 => bytecode.push(OP_INTC_0),
                1 => bytecode.push(OP_INTC_1),
                2 => bytecode.push(OP_INTC_2),
                3 => bytecode.push(OP_INTC_3),
                _ => {
                    bytecode.push(OP_INTC);
                    bytecode.push(*index);
                }
            },
            TealOpKind::Bytec(index) => match index {
                0 => bytecode.push(OP_BYTEC_0),
                1 => bytecode.push(OP_BYTEC_1),
                2 => bytecode.push(OP_BYTEC_2),
                3 => bytecode.push(OP_BYTEC_3),
                _ => {
                    bytecode.push(OP_BYTEC);
                    bytecode.push(*index);
                }
            },
            TealOpKind::TemplateInt(name) => match ctx.template_variables.get(name) {
                Some(TemplateValue::Int(value)) => {
                    bytecode.push(OP_PUSHINT);
                    bytecode.extend(encode_varuint(*value));
                }
                Some(TemplateValue::Bytes(_)) => {
                    return Err(CompileError::assembly_error(format!(
                        "template variable TMPL_{name} requires an integer value"
                    )));
                }
                None => {
                    return Err(CompileError::assembly_error(format!(
                        "unresolved template variable: TMPL_{name}"
                    )));
                }
            },
            TealOpKind::TemplateBytes(name) => match ctx.template_variables.get(name) {
                Some(TemplateValue::Bytes(value)) => {
                    bytecode.push(OP_PUSHBYTES);
                    push_length_prefixed(bytecode, value);
                }
                Some(TemplateValue::Int(_)) => {
                    return Err(CompileError::assembly_error(format!(
                        "template variable TMPL_{name} requires a bytes value"
                    )));
                }
                None => {
                    return Err(CompileError::assembly_error(format!(
                        "unresolved template variable: TMPL_{name}"
                    )));
                }
            },
            TealOpKind::Intrinsic { op, immediates, .. } => {
                let spec = intrinsic_opcode(op).ok_or_else(|| {
                    CompileError::assembly_error(format!("unknown opcode: {op}"))
                })?;
                bytecode.push(spec.opcode);
                if immediates.len() != spec.immediates {
                    return Err(CompileError::assembly_error(format!(
                        "{op} expects {} immediate(s), got {}",
                        spec.immediates,
                        immediates.len()
                    )));
                }
                for imm in immediates {
                    let byte = u8::try_from(*imm).map_err(|_| {
                        CompileError::assembly_error(format!(
                            "immediate out of range for {op}: {imm}"
                        ))
                    })?;
                    bytecode.push(byte);
                }
            }
            TealOpKind::Load(slot) => {
                bytecode.push(OP_LOAD);
                bytecode.push(*slot);
            }
            TealOpKind::Store(slot) => {
                bytecode.push(OP_STORE);
                bytecode.push(*slot);
            }
            TealOpKind::FrameDig(index) => {
                bytecode.push(OP_FRAME_DIG);
                bytecode.push(*index as u8);
            }
            TealOpKind::FrameBury(index) => {
                bytecode.push(OP_FRAME_BURY);
                bytecode.push(*index as u8);
            }
            TealOpKind::Proto { args, returns } => {
                bytecode.push(OP_PROTO);
                bytecode.push(*args);
                bytecode.push(*returns);
            }
            TealOpKind::Branch(target) => {
                bytecode.push(OP_B);
                self.assemble_branch_target(bytecode, target);
            }
            TealOpKind::BranchNonZero(target) => {
                bytecode.push(OP_BNZ);
                self.assemble_branch_target(bytecode, target);
            }
            TealOpKind::BranchZero(target) => {
                bytecode.push(OP_BZ);
                self.assemble_branch_target(bytecode, target);
            }
            TealOpKind::Switch(targets) => {
                bytecode.push(OP_SWITCH);
                bytecode.push(u8::try_from(targets.len()).map_err(|_| {
                    CompileError::assembly_error("too many switch targets")
                })?);
                // switch offsets are all relative to the pc after the whole
                // instruction, so record them before any is emitted
                let end = bytecode.len() + 2 * targets.len();
                for target in targets {
                    match self.labels.get(target) {
                        Some(&addr) => {
                            let offset = addr as i32 - end as i32;
                            bytecode.extend((offset as i16).to_be_bytes());
                        }
                        None => {
                            self.forward_refs
                                .push((bytecode.len(), target.clone()));
                            // record where the instruction ends for patching
                            self.switch_ends.insert(bytecode.len(), end);
                            bytecode.extend([0, 0]);
                        }
                    }
                }
            }
            TealOpKind::CallSub { target, .. } => {
                bytecode.push(OP_CALLSUB);
                self.assemble_branch_target(bytecode, target);
            }
            TealOpKind::RetSub { .. } => bytecode.push(OP_RETSUB),
        }
        Ok(())
    }

    /// Emit a 2-byte branch offset, or a placeholder for a forward reference
    fn assemble_branch_target(&mut self, bytecode: &mut Vec<u8>, target: &str) {
        if let Some(&addr) = self.labels.get(target) {
            // the offset is relative to the pc after the full instruction
            let pc_after_instruction = bytecode.len() + 2;
            let offset = addr as i32 - pc_after_instruction as i32;
            bytecode.extend((offset as i16).to_be_bytes());
        } else {
            self.forward_refs
                .push((bytecode.len(), target.to_string()));
            bytecode.extend([0, 0]);
        }
    }

    /// Patch every forward placeholder now that all labels are known
    fn resolve_forward_refs(&self, bytecode: &mut [u8]) -> CompileResult<()> {
        for (addr, label) in &self.forward_refs {
            let target_addr = self.labels.get(label).ok_or_else(|| {
                CompileError::assembly_error(format!("undefined label: {label}"))
            })?;
            let pc_after_instruction = self
                .switch_ends
                .get(addr)
                .copied()
                .unwrap_or(addr + 2);
            let offset = *target_addr as i32 - pc_after_instruction as i32;
            let offset_bytes = (offset as i16).to_be_bytes();
            bytecode[*addr] = offset_bytes[0];
            bytecode[*addr + 1] = offset_bytes[1];
        }
        Ok(())
    }
}

fn push_length_prefixed(bytecode: &mut Vec<u8>, value: &[u8]) {
    bytecode.extend(encode_varuint(value.len() as u64));
    bytecode.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teal::{TealBlock, TealOp, TealSubroutine, UNKNOWN_HEIGHT};

    fn one_block_program(ops: Vec<TealOpKind>) -> TealProgram {
        TealProgram {
            id: "t.approval".into(),
            target_avm_version: 10,
            main: TealSubroutine {
                is_main: true,
                signature_name: "approval".into(),
                blocks: vec![TealBlock {
                    label: "approval".into(),
                    ops: ops.into_iter().map(|kind| TealOp::new(kind, None)).collect(),
                    x_stack: vec![],
                    entry_stack_height: 0,
                    exit_stack_height: UNKNOWN_HEIGHT,
                }],
            },
            subroutines: vec![],
        }
    }

    #[test]
    fn test_simple_program_encoding() {
        let program = one_block_program(vec![
            TealOpKind::PushInt(1),
            TealOpKind::Intrinsic {
                op: "return".into(),
                immediates: vec![],
                consumes: 1,
                produces: 0,
            },
        ]);
        let mut ctx = AssembleContext::default();
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        // version 10, pushint 1, return
        assert_eq!(bytecode, vec![0x0a, 0x81, 0x01, 0x43]);
        // one event per op
        assert_eq!(ctx.events.len(), 2);
        assert_eq!(ctx.events[&1].op, "pushint 1");
    }

    #[test]
    fn test_backward_branch_offset() {
        // loop: b loop → offset is -3 (back over the whole instruction)
        let mut program = one_block_program(vec![TealOpKind::Branch("approval".into())]);
        program.main.blocks[0].exit_stack_height = 0;
        let mut ctx = AssembleContext::default();
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        assert_eq!(&bytecode[1..], &[0x42, 0xFF, 0xFD]);
    }

    #[test]
    fn test_forward_branch_is_patched() {
        let program = TealProgram {
            id: "t".into(),
            target_avm_version: 10,
            main: TealSubroutine {
                is_main: true,
                signature_name: "approval".into(),
                blocks: vec![
                    TealBlock {
                        label: "approval".into(),
                        ops: vec![TealOp::new(
                            TealOpKind::Branch("approval@1".into()),
                            None,
                        )],
                        x_stack: vec![],
                        entry_stack_height: 0,
                        exit_stack_height: 0,
                    },
                    TealBlock {
                        label: "approval@1".into(),
                        ops: vec![TealOp::new(
                            TealOpKind::Intrinsic {
                                op: "err".into(),
                                immediates: vec![],
                                consumes: 0,
                                produces: 0,
                            },
                            None,
                        )],
                        x_stack: vec![],
                        entry_stack_height: 0,
                        exit_stack_height: 0,
                    },
                ],
            },
            subroutines: vec![],
        };
        let mut ctx = AssembleContext::default();
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        // b +0 lands exactly on the next instruction
        assert_eq!(&bytecode[1..], &[0x42, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_template_substitution() {
        let program = one_block_program(vec![
            TealOpKind::TemplateInt("FEE".into()),
            TealOpKind::Intrinsic {
                op: "pop".into(),
                immediates: vec![],
                consumes: 1,
                produces: 0,
            },
        ]);
        let mut ctx = AssembleContext::new(
            [("FEE".to_string(), TemplateValue::Int(1000))].into(),
        );
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        assert_eq!(&bytecode[1..3], &[0x81, 0xE8]); // varuint(1000) = E8 07

        let mut empty = AssembleContext::default();
        let err = assemble_program(&mut empty, &program).unwrap_err();
        assert!(err.to_string().contains("unresolved template variable"));
    }

    #[test]
    fn test_wrong_template_kind_is_an_error() {
        let program = one_block_program(vec![TealOpKind::TemplateBytes("KEY".into())]);
        let mut ctx = AssembleContext::new(
            [("KEY".to_string(), TemplateValue::Int(3))].into(),
        );
        let err = assemble_program(&mut ctx, &program).unwrap_err();
        assert!(err.to_string().contains("requires a bytes value"));
    }

    #[test]
    fn test_intc_short_forms() {
        let program = one_block_program(vec![
            TealOpKind::IntcBlock(vec![5, 6, 7, 8, 9]),
            TealOpKind::Intc(0),
            TealOpKind::Intc(4),
        ]);
        let mut ctx = AssembleContext::default();
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        // intcblock 5 5 6 7 8 9 | intc_0 | intc 4
        assert_eq!(
            &bytecode[1..],
            &[0x20, 0x05, 0x05, 0x06, 0x07, 0x08, 0x09, 0x22, 0x21, 0x04]
        );
    }

    #[test]
    fn test_subroutine_call_resolves() {
        let program = TealProgram {
            id: "t".into(),
            target_avm_version: 10,
            main: TealSubroutine {
                is_main: true,
                signature_name: "approval".into(),
                blocks: vec![TealBlock {
                    label: "approval".into(),
                    ops: vec![
                        TealOp::new(
                            TealOpKind::CallSub {
                                target: "helper".into(),
                                consumes: 0,
                                produces: 1,
                            },
                            None,
                        ),
                        TealOp::new(
                            TealOpKind::Intrinsic {
                                op: "return".into(),
                                immediates: vec![],
                                consumes: 1,
                                produces: 0,
                            },
                            None,
                        ),
                    ],
                    x_stack: vec![],
                    entry_stack_height: 0,
                    exit_stack_height: 0,
                }],
            },
            subroutines: vec![TealSubroutine {
                is_main: false,
                signature_name: "helper".into(),
                blocks: vec![TealBlock {
                    label: "helper".into(),
                    ops: vec![
                        TealOp::new(TealOpKind::PushInt(1), None),
                        TealOp::new(TealOpKind::RetSub { returns: 1 }, None),
                    ],
                    x_stack: vec![],
                    entry_stack_height: 0,
                    exit_stack_height: 0,
                }],
            }],
        };
        let mut ctx = AssembleContext::default();
        let bytecode = assemble_program(&mut ctx, &program).unwrap();
        // version | callsub +1 | return | helper: pushint 1 | retsub
        assert_eq!(
            bytecode,
            vec![0x0a, 0x88, 0x00, 0x01, 0x43, 0x81, 0x01, 0x89]
        );
    }
}
