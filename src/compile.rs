//! The compilation pipeline: AWST in, TEAL text and bytecode out.
//!
//! Each stage consumes its full input before the next begins; diagnostics
//! accumulate in the shared context, and error gates stop the pipeline
//! before code generation when the source is broken.

use std::collections::BTreeMap;

use tracing::{debug, info_span};

use crate::assemble::{AssembleContext, Event, assemble_program};
use crate::awst::nodes::{Contract, Module};
use crate::diagnostic::DiagnosticContext;
use crate::error::CompileResult;
use crate::mir;
use crate::options::CompileOptions;
use crate::teal::{TealProgram, lower::mir_to_teal};

/// One fully-compiled program (a contract produces two: approval and clear)
#[derive(Debug)]
pub struct CompiledProgram {
    pub id: String,
    pub teal: TealProgram,
    pub teal_source: String,
    pub bytecode: Vec<u8>,
    pub debug_events: BTreeMap<usize, Event>,
}

impl CompiledProgram {
    /// The debug-event map in the JSON shape the debug-info writer consumes
    pub fn debug_events_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.debug_events)
    }
}

/// Compile every contract in a module
pub fn compile_module(
    ctx: &DiagnosticContext,
    module: &Module,
    options: &CompileOptions,
) -> CompileResult<Vec<CompiledProgram>> {
    let mut compiled = Vec::new();
    for contract in &module.contracts {
        compiled.extend(compile_contract(ctx, contract, options)?);
    }
    Ok(compiled)
}

/// Compile one contract's approval and clear-state programs
pub fn compile_contract(
    ctx: &DiagnosticContext,
    contract: &Contract,
    options: &CompileOptions,
) -> CompileResult<Vec<CompiledProgram>> {
    let span = info_span!("compile", contract = %contract.name);
    let _enter = span.enter();

    // errors from semantic analysis stop us before lowering
    ctx.check_gate()?;

    let mir_programs = mir::lower::lower_contract(ctx, contract)?;
    // lowering may surface further code errors; gate again before emission
    ctx.check_gate()?;

    let mut compiled = Vec::with_capacity(mir_programs.len());
    for mir_program in &mir_programs {
        let teal = mir_to_teal(options, mir_program)?;
        let teal_source = teal.to_string();
        let mut assemble_ctx = AssembleContext::new(options.template_variables.clone());
        let bytecode = assemble_program(&mut assemble_ctx, &teal)?;
        debug!(
            target: "avmc::compile",
            id = %teal.id,
            teal_lines = teal_source.lines().count(),
            bytes = bytecode.len(),
            "program compiled"
        );
        compiled.push(CompiledProgram {
            id: teal.id.clone(),
            teal_source,
            bytecode,
            debug_events: assemble_ctx.events,
            teal,
        });
    }
    Ok(compiled)
}
