//! AWST → MIR lowering: expression linearisation, scratch-slot allocation
//! for locals, and structured control flow to basic blocks.

use std::collections::HashMap;

use tracing::debug;

use crate::awst::nodes::{
    Contract, Expression, ExprKind, Immediate, Lvalue, Statement, Subroutine as AwstSubroutine,
};
use crate::diagnostic::DiagnosticContext;
use crate::error::InternalError;
use crate::source::SourceLocation;
use crate::wtypes::{Arc4Type, AvmType, WType};

use super::{Block, Op, OpKind, Program, Signature, StackManipulation, Subroutine};

/// Scratch space size on the AVM
const SCRATCH_SLOTS: usize = 256;

/// Lower a contract into its two programs. Scratch slots are allocated
/// program-wide so locals of different subroutines never collide.
pub fn lower_contract(
    ctx: &DiagnosticContext,
    contract: &Contract,
) -> Result<Vec<Program>, InternalError> {
    let mut programs = Vec::with_capacity(2);
    for (main, kind) in [(&contract.approval, "approval"), (&contract.clear_state, "clear")] {
        let mut slots = SlotAllocator::default();
        let main_sub = lower_subroutine(ctx, main, true, &mut slots)?;
        let mut subroutines = Vec::with_capacity(contract.subroutines.len());
        for sub in &contract.subroutines {
            subroutines.push(lower_subroutine(ctx, sub, false, &mut slots)?);
        }
        debug!(target: "avmc::mir", contract = %contract.name, kind, "lowered program");
        programs.push(Program {
            id: format!("{}.{kind}", contract.name),
            main: main_sub,
            subroutines,
        });
    }
    Ok(programs)
}

/// The number of stack values a wtype occupies (tuples are flattened)
pub fn arity(wtype: &WType) -> usize {
    match wtype {
        WType::Void => 0,
        WType::Tuple(tuple) => tuple.types.iter().map(arity).sum(),
        _ => 1,
    }
}

fn scalar_or_default(ctx: &DiagnosticContext, wtype: &WType, loc: Option<SourceLocation>) -> AvmType {
    match wtype.scalar_type() {
        Some(atype) => atype,
        None => {
            ctx.error(
                format!("{} cannot be passed on the stack", wtype.name()),
                loc,
            );
            AvmType::Uint64
        }
    }
}

#[derive(Default)]
pub struct SlotAllocator {
    next: usize,
}

impl SlotAllocator {
    fn allocate(&mut self, ctx: &DiagnosticContext, loc: Option<SourceLocation>) -> u8 {
        if self.next >= SCRATCH_SLOTS {
            ctx.error("too many local variables: scratch space exhausted", loc);
            return (SCRATCH_SLOTS - 1) as u8;
        }
        let slot = self.next as u8;
        self.next += 1;
        slot
    }
}

/// Lower one AWST subroutine to a MIR subroutine
pub fn lower_subroutine(
    ctx: &DiagnosticContext,
    sub: &AwstSubroutine,
    is_main: bool,
    slots: &mut SlotAllocator,
) -> Result<Subroutine, InternalError> {
    let mut returns = Vec::new();
    flatten_return_types(ctx, &sub.returns, sub.loc, &mut returns);
    let signature = Signature {
        name: sub.name.clone(),
        params: sub
            .params
            .iter()
            .map(|p| (p.name.clone(), scalar_or_default(ctx, &p.wtype, sub.loc)))
            .collect(),
        returns,
    };
    let mut lowerer = Lowerer {
        ctx,
        is_main,
        params: sub
            .params
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.name.clone(), idx))
            .collect(),
        param_count: sub.params.len(),
        return_count: signature.returns.len(),
        locals: HashMap::new(),
        slots,
        blocks: Vec::new(),
        ops: Vec::new(),
        label: "block@0".to_string(),
        label_seq: 1,
        height: 0,
        entry_height: 0,
    };
    if !is_main && (lowerer.param_count > 0 || lowerer.return_count > 0) {
        lowerer.emit(Op::new(
            OpKind::Proto {
                args: lowerer.param_count,
                returns: lowerer.return_count,
            },
            sub.loc,
        ));
    }
    for stmt in &sub.body {
        lowerer.lower_statement(stmt)?;
    }
    lowerer.finish(sub.loc);
    Ok(Subroutine {
        is_main,
        signature,
        blocks: lowerer.blocks,
    })
}

fn flatten_return_types(
    ctx: &DiagnosticContext,
    wtype: &WType,
    loc: Option<SourceLocation>,
    out: &mut Vec<AvmType>,
) {
    match wtype {
        WType::Void => {}
        WType::Tuple(tuple) => {
            for t in &tuple.types {
                flatten_return_types(ctx, t, loc, out);
            }
        }
        other => out.push(scalar_or_default(ctx, other, loc)),
    }
}

struct Lowerer<'a> {
    ctx: &'a DiagnosticContext,
    is_main: bool,
    params: HashMap<String, usize>,
    param_count: usize,
    return_count: usize,
    locals: HashMap<String, u8>,
    slots: &'a mut SlotAllocator,
    blocks: Vec<Block>,
    ops: Vec<Op>,
    label: String,
    label_seq: usize,
    height: usize,
    entry_height: usize,
}

impl Lowerer<'_> {
    fn emit(&mut self, op: Op) {
        let (consumes, produces) = op.stack_effect();
        self.height = self.height.saturating_sub(consumes) + produces;
        self.ops.push(op);
    }

    fn intrinsic(
        &mut self,
        op: &str,
        immediates: Vec<u64>,
        consumes: usize,
        produces: usize,
        loc: Option<SourceLocation>,
    ) {
        self.emit(Op::new(
            OpKind::Intrinsic {
                op: op.to_string(),
                immediates,
                consumes,
                produces,
            },
            loc,
        ));
    }

    fn new_label(&mut self) -> String {
        let label = format!("block@{}", self.label_seq);
        self.label_seq += 1;
        label
    }

    /// Close the current block and open `next`
    fn seal_block(&mut self, next: String) {
        let ops = std::mem::take(&mut self.ops);
        self.blocks.push(Block {
            name: std::mem::replace(&mut self.label, next),
            ops,
            entry_stack_height: self.entry_height,
            exit_stack_height: self.height,
            x_stack_in: vec![],
        });
        self.entry_height = self.height;
    }

    fn finish(&mut self, loc: Option<SourceLocation>) {
        let falls_through = self.ops.last().map(|op| !op.is_terminal()).unwrap_or(true);
        if falls_through {
            if !self.is_main && self.return_count == 0 {
                self.emit(Op::new(OpKind::RetSub { returns: 0 }, loc));
            } else {
                // reaching the end without an explicit return is a failure
                self.intrinsic("err", vec![], 0, 0, loc);
            }
        }
        let ops = std::mem::take(&mut self.ops);
        self.blocks.push(Block {
            name: self.label.clone(),
            ops,
            entry_stack_height: self.entry_height,
            exit_stack_height: self.height,
            x_stack_in: vec![],
        });
    }

    fn local_slot(&mut self, name: &str, loc: Option<SourceLocation>) -> u8 {
        if let Some(&slot) = self.locals.get(name) {
            return slot;
        }
        let slot = self.slots.allocate(self.ctx, loc);
        self.locals.insert(name.to_string(), slot);
        slot
    }

    /// Report a code error and push typed filler so stack heights stay
    /// consistent for further checking
    fn error_with_filler(&mut self, message: String, wtype: &WType, loc: Option<SourceLocation>) {
        self.ctx.error(message, loc);
        for _ in 0..arity(wtype) {
            self.emit(Op::new(OpKind::PushInt(0), loc));
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) -> Result<(), InternalError> {
        match stmt {
            Statement::Expression(expr) => {
                self.lower_expression(expr)?;
                for _ in 0..arity(&expr.wtype) {
                    self.intrinsic("pop", vec![], 1, 0, expr.loc);
                }
            }
            Statement::Assign { target, value, loc } => {
                self.lower_expression(value)?;
                match target {
                    Lvalue::Var { name, .. } => {
                        if let Some(&index) = self.params.get(name) {
                            let total = self.param_count;
                            self.emit(Op::with_manipulations(
                                OpKind::StoreParam { index, total },
                                vec![StackManipulation::Define { name: name.clone() }],
                                *loc,
                            ));
                        } else {
                            let slot = self.local_slot(name, *loc);
                            self.emit(Op::with_manipulations(
                                OpKind::StoreLocal {
                                    slot,
                                    name: name.clone(),
                                },
                                vec![StackManipulation::Define { name: name.clone() }],
                                *loc,
                            ));
                        }
                    }
                }
            }
            Statement::Return { value, loc } => {
                if let Some(value) = value {
                    self.lower_expression(value)?;
                }
                if self.is_main {
                    self.intrinsic("return", vec![], 1, 0, *loc);
                } else {
                    self.emit(Op::new(
                        OpKind::RetSub {
                            returns: self.return_count,
                        },
                        *loc,
                    ));
                }
                let next = self.new_label();
                self.seal_block(next);
            }
            Statement::Assert { condition, loc, .. } => {
                self.lower_expression(condition)?;
                self.intrinsic("assert", vec![], 1, 0, *loc);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                loc,
            } => {
                self.lower_expression(condition)?;
                let after = self.new_label();
                let else_label = if else_branch.is_empty() {
                    after.clone()
                } else {
                    self.new_label()
                };
                self.emit(Op::new(
                    OpKind::BranchZero {
                        target: else_label.clone(),
                    },
                    *loc,
                ));
                let then_entry = self.new_label();
                self.seal_block(then_entry);
                for stmt in then_branch {
                    self.lower_statement(stmt)?;
                }
                if !else_branch.is_empty() {
                    self.emit(Op::new(
                        OpKind::Branch {
                            target: after.clone(),
                        },
                        *loc,
                    ));
                    self.seal_block(else_label);
                    for stmt in else_branch {
                        self.lower_statement(stmt)?;
                    }
                }
                self.seal_block(after);
            }
            Statement::While {
                condition,
                body,
                loc,
            } => {
                let top = self.new_label();
                let after = self.new_label();
                self.emit(Op::new(OpKind::Branch { target: top.clone() }, *loc));
                self.seal_block(top.clone());
                self.lower_expression(condition)?;
                self.emit(Op::new(
                    OpKind::BranchZero {
                        target: after.clone(),
                    },
                    *loc,
                ));
                let body_entry = self.new_label();
                self.seal_block(body_entry);
                for stmt in body {
                    self.lower_statement(stmt)?;
                }
                self.emit(Op::new(OpKind::Branch { target: top }, *loc));
                self.seal_block(after);
            }
        }
        Ok(())
    }

    fn lower_expression(&mut self, expr: &Expression) -> Result<(), InternalError> {
        let loc = expr.loc;
        match &expr.kind {
            ExprKind::UInt64Constant(value) => self.emit(Op::new(OpKind::PushInt(*value), loc)),
            ExprKind::BoolConstant(value) => {
                self.emit(Op::new(OpKind::PushInt(u64::from(*value)), loc));
            }
            ExprKind::BigUIntConstant(value) => {
                self.emit(Op::new(OpKind::PushBytes(value.to_bytes_be()), loc));
            }
            ExprKind::BytesConstant(value) => {
                self.emit(Op::new(OpKind::PushBytes(value.clone()), loc));
            }
            ExprKind::StringConstant(value) => {
                self.emit(Op::new(OpKind::PushBytes(value.as_bytes().to_vec()), loc));
            }
            ExprKind::AddressConstant(address) => match decode_address(address) {
                Some(bytes) => self.emit(Op::new(OpKind::PushBytes(bytes), loc)),
                None => {
                    self.error_with_filler(
                        format!("invalid address literal: {address}"),
                        &expr.wtype,
                        loc,
                    );
                }
            },
            ExprKind::TemplateVar(name) => {
                let atype = scalar_or_default(self.ctx, &expr.wtype, loc);
                self.emit(Op::new(
                    OpKind::PushTemplateVar {
                        name: name.clone(),
                        atype,
                    },
                    loc,
                ));
            }
            ExprKind::VoidConstant => {}
            ExprKind::VarExpression(name) => {
                if let Some(&index) = self.params.get(name) {
                    let total = self.param_count;
                    self.emit(Op::new(OpKind::LoadParam { index, total }, loc));
                } else if let Some(&slot) = self.locals.get(name) {
                    self.emit(Op::new(
                        OpKind::LoadLocal {
                            slot,
                            name: name.clone(),
                        },
                        loc,
                    ));
                } else {
                    self.error_with_filler(
                        format!("undefined variable: {name}"),
                        &expr.wtype,
                        loc,
                    );
                }
            }
            ExprKind::UInt64BinaryOp { left, op, right } => {
                self.lower_expression(left)?;
                self.lower_expression(right)?;
                self.intrinsic(op.teal_op(), vec![], 2, 1, loc);
            }
            ExprKind::BigUIntBinaryOp { left, op, right } => {
                self.lower_expression(left)?;
                self.lower_expression(right)?;
                self.intrinsic(op.teal_op(), vec![], 2, 1, loc);
            }
            ExprKind::NumericComparison { left, op, right } => {
                let biguint = left.wtype == WType::BigUInt;
                self.lower_expression(left)?;
                self.lower_expression(right)?;
                let op_code = if biguint {
                    op.biguint_teal_op()
                } else {
                    op.teal_op()
                };
                self.intrinsic(op_code, vec![], 2, 1, loc);
            }
            ExprKind::BooleanBinaryOp { left, op, right } => {
                self.lower_expression(left)?;
                self.lower_expression(right)?;
                self.intrinsic(op.teal_op(), vec![], 2, 1, loc);
            }
            ExprKind::Not(value) => {
                self.lower_expression(value)?;
                self.intrinsic("!", vec![], 1, 1, loc);
            }
            ExprKind::IntrinsicCall {
                op_code,
                immediates,
                stack_args,
            } => {
                for arg in stack_args {
                    self.lower_expression(arg)?;
                }
                let immediates = immediates.iter().map(|Immediate(value)| *value).collect();
                self.intrinsic(
                    op_code,
                    immediates,
                    stack_args.iter().map(|a| arity(&a.wtype)).sum(),
                    arity(&expr.wtype),
                    loc,
                );
            }
            ExprKind::Arc4Encode { value } => {
                self.lower_arc4_encode(expr, value)?;
            }
            ExprKind::Arc4Decode { value } => {
                self.lower_arc4_decode(expr, value)?;
            }
            ExprKind::TupleExpression(items) => {
                for item in items {
                    self.lower_expression(item)?;
                }
            }
            ExprKind::TupleItem { base, index } => {
                self.lower_tuple_item(expr, base, *index)?;
            }
            ExprKind::NewArray { elements } => {
                self.lower_new_array(expr, elements)?;
            }
            ExprKind::SubroutineCall { name, args } => {
                let mut consumes = 0;
                for arg in args {
                    self.lower_expression(arg)?;
                    consumes += arity(&arg.wtype);
                }
                self.emit(Op::new(
                    OpKind::CallSub {
                        target: name.clone(),
                        consumes,
                        produces: arity(&expr.wtype),
                    },
                    loc,
                ));
            }
            ExprKind::ReinterpretCast { value } => {
                self.lower_expression(value)?;
            }
        }
        Ok(())
    }

    fn lower_arc4_encode(
        &mut self,
        expr: &Expression,
        value: &Expression,
    ) -> Result<(), InternalError> {
        let loc = expr.loc;
        let WType::Arc4(target) = &expr.wtype else {
            return Err(InternalError::new(
                "ARC-4 encode target is not an ARC-4 type",
                loc,
            ));
        };
        // whole-tree constants encode at compile time
        if let Some(folded) = crate::eb::arc4::try_fold_arc4_constant(value)
            && let Ok(encoded) = crate::arc4::encode(target, &folded)
        {
            self.emit(Op::new(OpKind::PushBytes(encoded), loc));
            return Ok(());
        }
        match (target, &value.wtype) {
            (Arc4Type::Bool, WType::Bool) => {
                // cond ? 0x80 : 0x00
                self.emit(Op::new(OpKind::PushBytes(vec![0x00]), loc));
                self.emit(Op::new(OpKind::PushBytes(vec![0x80]), loc));
                self.lower_expression(value)?;
                self.intrinsic("select", vec![], 3, 1, loc);
            }
            (Arc4Type::UIntN(u), WType::Uint64 | WType::Bool) => {
                let size = u.n as usize / 8;
                if size > 8 {
                    self.emit(Op::new(OpKind::PushBytes(vec![0; size - 8]), loc));
                    self.lower_expression(value)?;
                    self.intrinsic("itob", vec![], 1, 1, loc);
                    self.intrinsic("concat", vec![], 2, 1, loc);
                } else {
                    self.lower_expression(value)?;
                    self.intrinsic("itob", vec![], 1, 1, loc);
                    if size < 8 {
                        self.intrinsic("extract", vec![(8 - size) as u64, size as u64], 1, 1, loc);
                    }
                }
            }
            (Arc4Type::UIntN(u), WType::BigUInt) => {
                // left-pad with a zero byte-string of the target width
                let size = u.n as u64 / 8;
                self.lower_expression(value)?;
                self.emit(Op::new(OpKind::PushInt(size), loc));
                self.intrinsic("bzero", vec![], 1, 1, loc);
                self.intrinsic("b|", vec![], 2, 1, loc);
            }
            (Arc4Type::DynamicArray(_), WType::Bytes | WType::String) => {
                // length-prefix the raw bytes
                self.lower_expression(value)?;
                self.intrinsic("dup", vec![], 1, 2, loc);
                self.intrinsic("len", vec![], 1, 1, loc);
                self.intrinsic("itob", vec![], 1, 1, loc);
                self.intrinsic("extract", vec![6, 2], 1, 1, loc);
                self.intrinsic("swap", vec![], 2, 2, loc);
                self.intrinsic("concat", vec![], 2, 1, loc);
            }
            (Arc4Type::StaticArray(a), WType::Account) if a.size == 32 => {
                self.lower_expression(value)?;
            }
            (Arc4Type::Tuple(_) | Arc4Type::Struct(_), WType::Tuple(_)) => {
                self.lower_tuple_encode(target, value, loc)?;
            }
            _ => {
                self.error_with_filler(
                    format!(
                        "cannot encode {} to {} at runtime",
                        value.wtype.name(),
                        expr.wtype.name()
                    ),
                    &expr.wtype,
                    loc,
                );
            }
        }
        Ok(())
    }

    /// Runtime tuple encoding: concatenate field encodings. Supported when
    /// every member has a static size and members are not bit-packed bools.
    fn lower_tuple_encode(
        &mut self,
        target: &Arc4Type,
        value: &Expression,
        loc: Option<SourceLocation>,
    ) -> Result<(), InternalError> {
        let member_types: Vec<Arc4Type> = match target {
            Arc4Type::Tuple(t) => t.types.clone(),
            Arc4Type::Struct(s) => s.fields.iter().map(|(_, t)| t.clone()).collect(),
            _ => {
                return Err(InternalError::new("not a tuple encoding target", loc));
            }
        };
        let has_bool = member_types.iter().any(|t| matches!(t, Arc4Type::Bool));
        let all_static = member_types
            .iter()
            .all(|t| crate::arc4::static_size(t).is_some());
        let items: Option<&Vec<Expression>> = match &value.kind {
            ExprKind::TupleExpression(items) => Some(items),
            _ => None,
        };
        let (Some(items), false, true) = (items, has_bool, all_static) else {
            self.error_with_filler(
                format!(
                    "encoding this tuple to {} at runtime is not supported",
                    target.name()
                ),
                &WType::Arc4(target.clone()),
                loc,
            );
            return Ok(());
        };
        if items.len() != member_types.len() {
            self.error_with_filler(
                "tuple arity does not match encoding target".to_string(),
                &WType::Arc4(target.clone()),
                loc,
            );
            return Ok(());
        }
        for (idx, (item, member)) in items.iter().zip(&member_types).enumerate() {
            let member_wtype = WType::Arc4(member.clone());
            if item.wtype == member_wtype {
                self.lower_expression(item)?;
            } else {
                // synthesize the member encode
                let encode = Expression::new(
                    ExprKind::Arc4Encode {
                        value: Box::new(item.clone()),
                    },
                    member_wtype,
                    loc,
                );
                self.lower_expression(&encode)?;
            }
            if idx > 0 {
                self.intrinsic("concat", vec![], 2, 1, loc);
            }
        }
        Ok(())
    }

    fn lower_arc4_decode(
        &mut self,
        expr: &Expression,
        value: &Expression,
    ) -> Result<(), InternalError> {
        let loc = expr.loc;
        let WType::Arc4(source) = &value.wtype else {
            return Err(InternalError::new(
                "ARC-4 decode source is not an ARC-4 type",
                loc,
            ));
        };
        match (source, &expr.wtype) {
            (Arc4Type::Bool, WType::Bool) => {
                self.lower_expression(value)?;
                self.emit(Op::new(OpKind::PushInt(0), loc));
                self.intrinsic("getbit", vec![], 2, 1, loc);
            }
            (Arc4Type::UIntN(u), WType::Uint64) if u.n <= 64 => {
                self.lower_expression(value)?;
                self.intrinsic("btoi", vec![], 1, 1, loc);
            }
            (Arc4Type::UIntN(_), WType::BigUInt) => {
                // already a big-endian byte string
                self.lower_expression(value)?;
            }
            (Arc4Type::DynamicArray(_), WType::Bytes | WType::String) => {
                // strip the length prefix
                self.lower_expression(value)?;
                self.intrinsic("extract", vec![2, 0], 1, 1, loc);
            }
            (Arc4Type::StaticArray(_), WType::Account) => {
                self.lower_expression(value)?;
            }
            (Arc4Type::Tuple(t), WType::Tuple(_)) => {
                self.lower_tuple_decode(&t.types.clone(), value, loc)?;
            }
            (Arc4Type::Struct(_), _) => {
                self.error_with_filler(
                    "ARC-4 struct types do not support decoding".to_string(),
                    &expr.wtype,
                    loc,
                );
            }
            _ => {
                self.error_with_filler(
                    format!(
                        "cannot decode {} to {}",
                        value.wtype.name(),
                        expr.wtype.name()
                    ),
                    &expr.wtype,
                    loc,
                );
            }
        }
        Ok(())
    }

    /// Decode a static-layout tuple into its flattened members
    fn lower_tuple_decode(
        &mut self,
        members: &[Arc4Type],
        value: &Expression,
        loc: Option<SourceLocation>,
    ) -> Result<(), InternalError> {
        let has_bool = members.iter().any(|t| matches!(t, Arc4Type::Bool));
        let sizes: Option<Vec<usize>> = members.iter().map(crate::arc4::static_size).collect();
        let (false, Some(sizes)) = (has_bool, sizes) else {
            self.ctx.error(
                "decoding this tuple layout at runtime is not supported",
                loc,
            );
            for _ in members {
                self.emit(Op::new(OpKind::PushInt(0), loc));
            }
            return Ok(());
        };
        // each member is a fixed-size slice of the encoding; members stay
        // ARC-4 encoded (tuples decode to tuples of ARC-4 values)
        let mut offset = 0usize;
        for size in &sizes {
            self.lower_expression(value)?;
            self.intrinsic("extract", vec![offset as u64, *size as u64], 1, 1, loc);
            offset += size;
        }
        Ok(())
    }

    /// Select one member of a flattened tuple value
    fn lower_tuple_item(
        &mut self,
        expr: &Expression,
        base: &Expression,
        index: usize,
    ) -> Result<(), InternalError> {
        let loc = expr.loc;
        // selecting from a tuple display only evaluates the chosen item
        if let ExprKind::TupleExpression(items) = &base.kind {
            match items.get(index) {
                Some(item) => self.lower_expression(item)?,
                None => {
                    self.error_with_filler(
                        "tuple index out of bounds".to_string(),
                        &expr.wtype,
                        loc,
                    );
                }
            }
            return Ok(());
        }
        // ARC-4 tuples select by slicing the encoding
        if let WType::Arc4(Arc4Type::Tuple(t)) = &base.wtype {
            let members = t.types.clone();
            let has_bool = members.iter().any(|m| matches!(m, Arc4Type::Bool));
            let sizes: Option<Vec<usize>> =
                members.iter().map(crate::arc4::static_size).collect();
            let (false, Some(sizes)) = (has_bool, sizes) else {
                self.error_with_filler(
                    "selecting from this tuple layout at runtime is not supported".to_string(),
                    &expr.wtype,
                    loc,
                );
                return Ok(());
            };
            let offset: usize = sizes[..index].iter().sum();
            self.lower_expression(base)?;
            self.intrinsic(
                "extract",
                vec![offset as u64, sizes[index] as u64],
                1,
                1,
                loc,
            );
            return Ok(());
        }
        // general flattened tuple: drop everything but the selected value
        let WType::Tuple(tuple) = &base.wtype else {
            return Err(InternalError::new(
                "tuple item selection from a non-tuple value",
                loc,
            ));
        };
        let arities: Vec<usize> = tuple.types.iter().map(arity).collect();
        if index >= arities.len() || arities.iter().any(|a| *a != 1) {
            self.error_with_filler(
                "selecting this tuple member at runtime is not supported".to_string(),
                &expr.wtype,
                loc,
            );
            return Ok(());
        }
        self.lower_expression(base)?;
        let above = arities.len() - index - 1;
        for _ in 0..above {
            self.intrinsic("pop", vec![], 1, 0, loc);
        }
        for _ in 0..index {
            self.intrinsic("swap", vec![], 2, 2, loc);
            self.intrinsic("pop", vec![], 1, 0, loc);
        }
        Ok(())
    }

    /// Construct an ARC-4 array from element expressions at runtime
    fn lower_new_array(
        &mut self,
        expr: &Expression,
        elements: &[Expression],
    ) -> Result<(), InternalError> {
        let loc = expr.loc;
        let WType::Arc4(target) = &expr.wtype else {
            return Err(InternalError::new("NewArray target is not ARC-4", loc));
        };
        let (element_type, prefix) = match target {
            Arc4Type::DynamicArray(a) => (a.element.clone(), true),
            Arc4Type::StaticArray(a) => (a.element.clone(), false),
            _ => {
                return Err(InternalError::new("NewArray target is not an array", loc));
            }
        };
        if matches!(element_type, Arc4Type::Bool)
            || crate::arc4::static_size(&element_type).is_none()
        {
            self.error_with_filler(
                format!(
                    "constructing {} from non-constant elements is not supported",
                    target.name()
                ),
                &expr.wtype,
                loc,
            );
            return Ok(());
        }
        if prefix {
            let count = u16::try_from(elements.len()).unwrap_or(u16::MAX);
            self.emit(Op::new(OpKind::PushBytes(count.to_be_bytes().to_vec()), loc));
        }
        for (idx, element) in elements.iter().enumerate() {
            self.lower_expression(element)?;
            if idx > 0 || prefix {
                self.intrinsic("concat", vec![], 2, 1, loc);
            }
        }
        if elements.is_empty() && !prefix {
            self.emit(Op::new(OpKind::PushBytes(vec![]), loc));
        }
        Ok(())
    }
}

fn decode_address(address: &str) -> Option<Vec<u8>> {
    if !crate::wtypes::queries::valid_address(address) {
        return None;
    }
    let decoded = base32::decode(base32::Alphabet::Rfc4648 { padding: false }, address)?;
    Some(decoded[..crate::wtypes::PUBLIC_KEY_HASH_LENGTH].to_vec())
}
