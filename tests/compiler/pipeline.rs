//! End-to-end pipeline tests: AWST through MIR and TEAL to bytecode

use avmc::awst::nodes::{
    Expression, ExprKind, Lvalue, NumericComparisonOp, Parameter, Statement, Subroutine,
    UInt64BinaryOperator,
};
use avmc::diagnostic::DiagnosticContext;
use avmc::eb::{BuilderBinaryOp, builder_for_instance, dispatch};
use avmc::options::{CompileOptions, TemplateValue};
use avmc::wtypes::WType;
use avmc::{CompileError, compile_contract};

use crate::common::contract_with_approval;

fn uint64_var(name: &str) -> Expression {
    Expression::new(ExprKind::VarExpression(name.into()), WType::Uint64, None)
}

fn binary(left: Expression, op: UInt64BinaryOperator, right: Expression) -> Expression {
    Expression::new(
        ExprKind::UInt64BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        WType::Uint64,
        None,
    )
}

fn compare(left: Expression, op: NumericComparisonOp, right: Expression) -> Expression {
    Expression::new(
        ExprKind::NumericComparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        WType::Bool,
        None,
    )
}

/// x = 2 + 3; if x < 10 { return x } else { return 0 }
fn branching_body() -> Vec<Statement> {
    vec![
        Statement::Assign {
            target: Lvalue::Var {
                name: "x".into(),
                wtype: WType::Uint64,
                loc: None,
            },
            value: binary(
                Expression::uint64(2, None),
                UInt64BinaryOperator::Add,
                Expression::uint64(3, None),
            ),
            loc: None,
        },
        Statement::If {
            condition: compare(
                uint64_var("x"),
                NumericComparisonOp::Lt,
                Expression::uint64(10, None),
            ),
            then_branch: vec![Statement::Return {
                value: Some(uint64_var("x")),
                loc: None,
            }],
            else_branch: vec![Statement::Return {
                value: Some(Expression::uint64(0, None)),
                loc: None,
            }],
            loc: None,
        },
    ]
}

#[test]
fn test_branching_contract_compiles_at_every_level() {
    for level in [0u8, 1, 2] {
        let ctx = DiagnosticContext::new();
        let contract = contract_with_approval("demo", branching_body());
        let options = CompileOptions {
            optimization_level: level,
            ..CompileOptions::default()
        };
        let compiled = compile_contract(&ctx, &contract, &options)
            .unwrap_or_else(|e| panic!("level {level}: {e}"));
        // approval and clear programs
        assert_eq!(compiled.len(), 2);
        for program in &compiled {
            assert!(!program.bytecode.is_empty());
            assert!(!program.debug_events.is_empty());
            assert!(program.teal_source.starts_with("#pragma version"));
        }
        assert_eq!(compiled[0].id, "demo.approval");
        assert_eq!(compiled[1].id, "demo.clear");
    }
}

#[test]
fn test_teal_labels_are_unique_and_resolve() {
    let ctx = DiagnosticContext::new();
    let contract = contract_with_approval("demo", branching_body());
    let compiled =
        compile_contract(&ctx, &contract, &CompileOptions::default()).unwrap();
    for program in &compiled {
        // validated internally; double-check through the public API
        program.teal.validate_labels().unwrap();
        for sub in program.teal.all_subroutines() {
            for block in &sub.blocks {
                block.validate().unwrap();
            }
        }
    }
}

#[test]
fn test_subroutine_call_round_trip() {
    let helper = Subroutine {
        name: "add_one".into(),
        params: vec![Parameter {
            name: "n".into(),
            wtype: WType::Uint64,
        }],
        returns: WType::Uint64,
        body: vec![Statement::Return {
            value: Some(binary(
                uint64_var("n"),
                UInt64BinaryOperator::Add,
                Expression::uint64(1, None),
            )),
            loc: None,
        }],
        loc: None,
    };
    let call = Expression::new(
        ExprKind::SubroutineCall {
            name: "add_one".into(),
            args: vec![Expression::uint64(41, None)],
        },
        WType::Uint64,
        None,
    );
    let mut contract = contract_with_approval(
        "callers",
        vec![Statement::Return {
            value: Some(call),
            loc: None,
        }],
    );
    contract.subroutines.push(helper);

    let ctx = DiagnosticContext::new();
    let compiled =
        compile_contract(&ctx, &contract, &CompileOptions::default()).unwrap();
    let approval = &compiled[0];
    assert!(approval.teal_source.contains("callsub add_one"));
    assert!(approval.teal_source.contains("proto 1 1"));
    assert!(approval.teal_source.contains("retsub"));
}

#[test]
fn test_while_loop_branches_backward() {
    // i = 0; while i < 5 { i = i + 1 }; return i
    let body = vec![
        Statement::Assign {
            target: Lvalue::Var {
                name: "i".into(),
                wtype: WType::Uint64,
                loc: None,
            },
            value: Expression::uint64(0, None),
            loc: None,
        },
        Statement::While {
            condition: compare(
                uint64_var("i"),
                NumericComparisonOp::Lt,
                Expression::uint64(5, None),
            ),
            body: vec![Statement::Assign {
                target: Lvalue::Var {
                    name: "i".into(),
                    wtype: WType::Uint64,
                    loc: None,
                },
                value: binary(
                    uint64_var("i"),
                    UInt64BinaryOperator::Add,
                    Expression::uint64(1, None),
                ),
                loc: None,
            }],
            loc: None,
        },
        Statement::Return {
            value: Some(uint64_var("i")),
            loc: None,
        },
    ];
    let ctx = DiagnosticContext::new();
    let contract = contract_with_approval("looper", body);
    let compiled =
        compile_contract(&ctx, &contract, &CompileOptions::default()).unwrap();
    let approval = &compiled[0];
    // the loop head is a branch target and keeps its own labelled block
    assert!(approval.teal_source.contains("bz "));
    assert!(approval.teal_source.contains("b approval@"));
    assert!(!approval.debug_events_json().unwrap().is_empty());
}

#[test]
fn test_error_gate_stops_compilation() {
    let ctx = DiagnosticContext::new();
    ctx.error("something earlier went wrong", None);
    let contract = contract_with_approval("broken", branching_body());
    match compile_contract(&ctx, &contract, &CompileOptions::default()) {
        Err(CompileError::ErrorsReported { errors }) => assert_eq!(errors, 1),
        other => panic!("expected the gate to trip, got {other:?}"),
    }
}

#[test]
fn test_template_variables_substitute_or_fail() {
    let body = vec![
        Statement::Assert {
            condition: compare(
                Expression::new(
                    ExprKind::TemplateVar("FEE".into()),
                    WType::Uint64,
                    None,
                ),
                NumericComparisonOp::Le,
                Expression::uint64(1000, None),
            ),
            comment: None,
            loc: None,
        },
        Statement::Return {
            value: Some(Expression::uint64(1, None)),
            loc: None,
        },
    ];

    let ctx = DiagnosticContext::new();
    let contract = contract_with_approval("templated", body.clone());
    let mut options = CompileOptions::default();
    options
        .template_variables
        .insert("FEE".into(), TemplateValue::Int(500));
    let compiled = compile_contract(&ctx, &contract, &options).unwrap();
    assert!(compiled[0].teal_source.contains("int TMPL_FEE"));

    // unresolved template variables are an assembly failure
    let ctx = DiagnosticContext::new();
    let contract = contract_with_approval("templated", body);
    let result = compile_contract(&ctx, &contract, &CompileOptions::default());
    match result {
        Err(CompileError::Assembly(message)) => {
            assert!(message.contains("TMPL_FEE"));
        }
        other => panic!("expected an assembly error, got {other:?}"),
    }
}

#[test]
fn test_optimizer_folds_constants() {
    let ctx = DiagnosticContext::new();
    let contract = contract_with_approval(
        "folded",
        vec![Statement::Return {
            value: Some(binary(
                Expression::uint64(6, None),
                UInt64BinaryOperator::Mult,
                Expression::uint64(7, None),
            )),
            loc: None,
        }],
    );
    let options = CompileOptions {
        optimization_level: 2,
        ..CompileOptions::default()
    };
    let compiled = compile_contract(&ctx, &contract, &options).unwrap();
    let approval = &compiled[0];
    assert!(approval.teal_source.contains("pushint 42"));
    assert!(!approval.teal_source.contains("pushint 6"));
}

#[test]
fn test_division_diagnostic_keeps_compiling() {
    // BigUInt / BigUInt reports but resolves to floor division
    let ctx = DiagnosticContext::new();
    let lhs = builder_for_instance(
        ctx.clone(),
        Expression::biguint(7u32.into(), None),
    );
    let rhs = builder_for_instance(
        ctx.clone(),
        Expression::biguint(2u32.into(), None),
    );
    let result = dispatch::binary_op(&ctx, &*lhs, &*rhs, BuilderBinaryOp::Div, None);
    assert_eq!(ctx.error_count(), 1);
    let drained = ctx.drain();
    assert!(
        drained[0]
            .message
            .contains("only the truncating division operator (//) is supported")
    );
    // the result is usable floor-division output, not a poisoned value
    assert!(matches!(
        result.resolve().kind,
        ExprKind::BigUIntBinaryOp { .. }
    ));
}
