//! Predicate AST.
//!
//! Predicates are plain data: they carry no captured identity or closures.
//! Identity values enter only at evaluation time through the
//! [`Predicate::CompareToIdentity`] and [`Predicate::CompareIdentity`] nodes.

use crate::IdentityField;
use schema::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "IS")]
    Is,
    #[serde(rename = "IS NOT")]
    IsNot,
}

impl Op {
    /// Apply the operator with SQL semantics.
    ///
    /// Every operator except `IS`/`IS NOT` is false when either side is
    /// NULL. Values of different types are unequal and unordered.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        match self {
            Op::Is => left == right,
            Op::IsNot => left != right,
            _ if left.is_null() || right.is_null() => false,
            Op::Eq => left == right,
            Op::Ne => left != right,
            Op::Lt => order(left, right) == Some(Ordering::Less),
            Op::Le => matches!(order(left, right), Some(Ordering::Less | Ordering::Equal)),
            Op::Gt => order(left, right) == Some(Ordering::Greater),
            Op::Ge => matches!(order(left, right), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Is => "IS",
            Op::IsNot => "IS NOT",
        };
        f.write_str(s)
    }
}

/// A boolean condition over (identity, row, related rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `row.field <op> value`
    Compare { field: String, op: Op, value: Value },
    /// `identity.<identity> <op> row.field`
    CompareToIdentity {
        identity: IdentityField,
        op: Op,
        field: String,
    },
    /// `identity.<identity> <op> value`
    CompareIdentity {
        identity: IdentityField,
        op: Op,
        value: Value,
    },
    /// True when every child is true. Stops at the first false child.
    And { of: Vec<Predicate> },
    /// True when any child is true. Stops at the first true child.
    Or { of: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
    /// True when at least one row reached through `relationship` satisfies
    /// `predicate`, which is evaluated against the relationship's target
    /// table.
    Exists {
        relationship: String,
        predicate: Box<Predicate>,
    },
    AllowAll,
    DenyAll,
}
