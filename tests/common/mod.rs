//! Shared helpers for integration tests

use avmc::awst::nodes::{Contract, Expression, Statement, Subroutine};
use avmc::wtypes::WType;

/// A minimal clear-state program that always approves
pub fn approve_all(name: &str) -> Subroutine {
    Subroutine {
        name: name.into(),
        params: vec![],
        returns: WType::Uint64,
        body: vec![Statement::Return {
            value: Some(Expression::uint64(1, None)),
            loc: None,
        }],
        loc: None,
    }
}

/// Wrap an approval body into a full contract
pub fn contract_with_approval(name: &str, body: Vec<Statement>) -> Contract {
    Contract {
        name: name.into(),
        approval: Subroutine {
            name: "approval".into(),
            params: vec![],
            returns: WType::Uint64,
            body,
            loc: None,
        },
        clear_state: approve_all("clear"),
        subroutines: vec![],
        loc: None,
    }
}
