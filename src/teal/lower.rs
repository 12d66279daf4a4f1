//! MIR → TEAL lowering.
//!
//! Blocks that are not branch targets merge into their predecessor (the
//! primary size reduction before optimization), the first block of `main`
//! takes the subroutine's signature name as its label, and the stack
//! manipulation audit trail is asserted to survive optimization bit-for-bit.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::InternalError;
use crate::mir;
use crate::options::CompileOptions;

use super::optimize::combine_pushes::combine_pushes;
use super::optimize::constant_block::gather_program_constants;
use super::optimize::optimize_teal_program;
use super::stack::Stack;
use super::{TealBlock, TealProgram, TealSubroutine, UNKNOWN_HEIGHT};

/// Lower a MIR program to validated TEAL, running the optimizer according to
/// the options
pub fn mir_to_teal(
    options: &CompileOptions,
    program_mir: &mir::Program,
) -> Result<TealProgram, InternalError> {
    let mut teal = build_teal(options, program_mir)?;

    let before = teal.stack_manipulations();
    if options.optimized() {
        optimize_teal_program(&mut teal);
    }
    gather_program_constants(&mut teal);
    if options.optimized() {
        combine_pushes(&mut teal);
    }
    let after = teal.stack_manipulations();
    if before != after {
        return Err(InternalError::new(
            "expected stack manipulations to be preserved after optimization",
            None,
        ));
    }

    for sub in teal.all_subroutines() {
        for block in &sub.blocks {
            block.validate()?;
        }
    }
    teal.validate_labels()?;
    debug!(target: "avmc::teal", id = %teal.id, "lowered and validated TEAL");
    Ok(teal)
}

fn build_teal(
    options: &CompileOptions,
    mir_program: &mir::Program,
) -> Result<TealProgram, InternalError> {
    Ok(TealProgram {
        id: mir_program.id.clone(),
        target_avm_version: options.target_avm_version,
        main: lower_sub(&mir_program.main)?,
        subroutines: mir_program
            .subroutines
            .iter()
            .map(lower_sub)
            .collect::<Result<_, _>>()?,
    })
}

/// MIR block names are unique per subroutine only; qualify them with the
/// subroutine name so labels are unique program-wide. The first block takes
/// the signature name, which is also what `callsub` targets.
fn qualified_label(sub: &mir::Subroutine, block_name: &str) -> String {
    if block_name == "block@0" {
        sub.signature.name.clone()
    } else {
        block_name.replace("block@", &format!("{}@", sub.signature.name))
    }
}

fn lower_sub(mir_sub: &mir::Subroutine) -> Result<TealSubroutine, InternalError> {
    let mut sub = TealSubroutine {
        is_main: mir_sub.is_main,
        signature_name: mir_sub.signature.name.clone(),
        blocks: vec![],
    };

    let mut stack = Stack::new();
    let referenced_labels = referenced_labels(mir_sub);

    for (block_idx, mir_block) in mir_sub.blocks.iter().enumerate() {
        stack.begin_block(mir_block);
        if block_idx == 0 || referenced_labels.contains(mir_block.name.as_str()) {
            sub.blocks.push(TealBlock {
                label: qualified_label(mir_sub, &mir_block.name),
                ops: vec![],
                x_stack: mir_block.x_stack_in.clone(),
                entry_stack_height: mir_block.entry_stack_height as i64,
                exit_stack_height: UNKNOWN_HEIGHT,
            });
        }
        let Some(last_block) = sub.blocks.last_mut() else {
            return Err(InternalError::new("subroutine lowered no blocks", None));
        };
        last_block.exit_stack_height = mir_block.exit_stack_height as i64;
        for mir_op in &mir_block.ops {
            let mut teal_ops = stack.lower_op(mir_op)?;
            // rewrite intra-subroutine branch targets to qualified labels
            for teal_op in &mut teal_ops {
                qualify_targets(mir_sub, &mut teal_op.kind);
            }
            last_block.ops.extend(teal_ops);
        }
    }

    Ok(sub)
}

fn qualify_targets(sub: &mir::Subroutine, kind: &mut super::TealOpKind) {
    use super::TealOpKind;
    match kind {
        TealOpKind::Branch(target)
        | TealOpKind::BranchNonZero(target)
        | TealOpKind::BranchZero(target) => {
            *target = qualified_label(sub, target);
        }
        TealOpKind::Switch(targets) => {
            for target in targets {
                *target = qualified_label(sub, target);
            }
        }
        // callsub targets other subroutines by signature name already
        _ => {}
    }
}

fn referenced_labels(subroutine: &mir::Subroutine) -> BTreeSet<&str> {
    let mut result = BTreeSet::new();
    for block in &subroutine.blocks {
        for op in &block.ops {
            result.extend(op.branch_targets());
        }
    }
    result
}
