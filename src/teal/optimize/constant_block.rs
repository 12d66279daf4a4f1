//! Constant-block gathering: hoist repeated integer and byte literals into
//! `intcblock`/`bytecblock` at the top of the program, rewriting their users
//! to constant-slot references.
//!
//! Runs at every optimization level: a `pushint` costs the varuint width of
//! its value on every use, while an `intc_0..3` costs one byte.

use std::collections::BTreeMap;

use tracing::debug;

use super::super::{TealOp, TealOpKind, TealProgram};

/// Values used at least this often move into the constant block
const HOIST_THRESHOLD: usize = 2;
/// Constant blocks are capped at the one-byte index range
const MAX_CONSTANTS: usize = 256;

pub fn gather_program_constants(program: &mut TealProgram) {
    let mut int_counts: BTreeMap<u64, usize> = BTreeMap::new();
    let mut byte_counts: BTreeMap<Vec<u8>, usize> = BTreeMap::new();
    for sub in program.all_subroutines() {
        for block in &sub.blocks {
            for op in &block.ops {
                match &op.kind {
                    TealOpKind::PushInt(value) => {
                        *int_counts.entry(*value).or_default() += 1;
                    }
                    TealOpKind::PushBytes(value) => {
                        *byte_counts.entry(value.clone()).or_default() += 1;
                    }
                    _ => {}
                }
            }
        }
    }

    let int_block = pick_constants(int_counts);
    let byte_block = pick_constants(byte_counts);
    if int_block.is_empty() && byte_block.is_empty() {
        return;
    }

    let int_index: BTreeMap<u64, u8> = int_block
        .iter()
        .enumerate()
        .map(|(idx, value)| (*value, idx as u8))
        .collect();
    let byte_index: BTreeMap<Vec<u8>, u8> = byte_block
        .iter()
        .enumerate()
        .map(|(idx, value)| (value.clone(), idx as u8))
        .collect();

    for sub in program.all_subroutines_mut() {
        for block in &mut sub.blocks {
            for op in &mut block.ops {
                match &op.kind {
                    TealOpKind::PushInt(value) => {
                        if let Some(&idx) = int_index.get(value) {
                            op.kind = TealOpKind::Intc(idx);
                        }
                    }
                    TealOpKind::PushBytes(value) => {
                        if let Some(idx) = byte_index.get(value) {
                            op.kind = TealOpKind::Bytec(*idx);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    debug!(
        target: "avmc::teal",
        ints = int_block.len(),
        bytes = byte_block.len(),
        "gathered program constants"
    );
    // the constant blocks execute once, before everything else
    let entry = &mut program.main.blocks[0].ops;
    if !byte_block.is_empty() {
        entry.insert(0, TealOp::new(TealOpKind::BytecBlock(byte_block), None));
    }
    if !int_block.is_empty() {
        entry.insert(0, TealOp::new(TealOpKind::IntcBlock(int_block), None));
    }
}

/// Order hoisted constants by use count (descending) so the most-used land
/// in the single-byte `intc_0..3`/`bytec_0..3` encodings
fn pick_constants<T: Clone + Ord>(counts: BTreeMap<T, usize>) -> Vec<T> {
    let mut eligible: Vec<(T, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= HOIST_THRESHOLD)
        .collect();
    eligible.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    eligible.truncate(MAX_CONSTANTS);
    eligible.into_iter().map(|(value, _)| value).collect()
}
