//! Rule composition helpers.
//!
//! Small constructors for [`Predicate`] nodes plus named building blocks
//! that rules are usually written from:
//!
//! ```
//! use policy::compose::{and, exists, is_creator, is_elevated, logged_in};
//!
//! let can_see_comment = exists("task", logged_in());
//! let may_edit_comment = [is_elevated(), and([is_creator(), can_see_comment])];
//! assert_eq!(may_edit_comment.len(), 2);
//! ```

use crate::{Error, IdentityField, Op, Predicate, Result};
use schema::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Conjunction of `children`, evaluated in order.
pub fn and(children: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::And {
        of: children.into_iter().collect(),
    }
}

/// Disjunction of `children`, evaluated in order.
pub fn or(children: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Or {
        of: children.into_iter().collect(),
    }
}

pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not {
        predicate: Box::new(predicate),
    }
}

/// At least one row reached through `relationship` satisfies `predicate`.
pub fn exists(relationship: impl Into<String>, predicate: Predicate) -> Predicate {
    Predicate::Exists {
        relationship: relationship.into(),
        predicate: Box::new(predicate),
    }
}

/// `row.field <op> value`
pub fn cmp(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Predicate {
    Predicate::Compare {
        field: field.into(),
        op,
        value: value.into(),
    }
}

/// `identity.<identity> <op> row.field`
pub fn cmp_identity(identity: IdentityField, op: Op, field: impl Into<String>) -> Predicate {
    Predicate::CompareToIdentity {
        identity,
        op,
        field: field.into(),
    }
}

/// `identity.<identity> <op> value`
pub fn identity_is(identity: IdentityField, op: Op, value: impl Into<Value>) -> Predicate {
    Predicate::CompareIdentity {
        identity,
        op,
        value: value.into(),
    }
}

/// The caller has a subject.
pub fn logged_in() -> Predicate {
    identity_is(IdentityField::Subject, Op::IsNot, Value::Null)
}

/// The caller is logged in with the elevated role.
pub fn is_elevated() -> Predicate {
    and([
        logged_in(),
        identity_is(IdentityField::Role, Op::Eq, "elevated"),
    ])
}

/// The caller is logged in and `field` holds their subject.
pub fn owns(field: impl Into<String>) -> Predicate {
    and([
        logged_in(),
        cmp_identity(IdentityField::Subject, Op::Eq, field),
    ])
}

/// `owns("creator_id")`
pub fn is_creator() -> Predicate {
    owns("creator_id")
}

/// A row is visible when the row it belongs to through `relationship` is.
pub fn can_see_via(relationship: impl Into<String>, parent_visible: Predicate) -> Predicate {
    exists(relationship, parent_visible)
}

/// Named, reusable predicates.
///
/// Definitions may refer to one another through [`PredicateRef::Use`]; the
/// references are expanded by [`PredicateLibrary::expand`], which rejects
/// unknown names and reference cycles.
#[derive(Debug, Clone, Default)]
pub struct PredicateLibrary {
    defs: BTreeMap<String, PredicateRef>,
}

/// A predicate that may still contain references to named predicates.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateRef {
    Compare {
        field: String,
        op: Op,
        #[serde(default)]
        value: Value,
    },
    CompareToIdentity {
        identity: IdentityField,
        op: Op,
        field: String,
    },
    #[serde(rename = "identity")]
    CompareIdentity {
        identity: IdentityField,
        op: Op,
        #[serde(default)]
        value: Value,
    },
    And {
        of: Vec<PredicateRef>,
    },
    Or {
        of: Vec<PredicateRef>,
    },
    Not {
        predicate: Box<PredicateRef>,
    },
    Exists {
        relationship: String,
        #[serde(default = "allow_all", rename = "where")]
        predicate: Box<PredicateRef>,
    },
    AllowAll,
    DenyAll,
    /// Reference to a named predicate.
    Use {
        name: String,
    },
}

fn allow_all() -> Box<PredicateRef> {
    Box::new(PredicateRef::AllowAll)
}

impl From<Predicate> for PredicateRef {
    fn from(p: Predicate) -> Self {
        match p {
            Predicate::Compare { field, op, value } => PredicateRef::Compare { field, op, value },
            Predicate::CompareToIdentity {
                identity,
                op,
                field,
            } => PredicateRef::CompareToIdentity {
                identity,
                op,
                field,
            },
            Predicate::CompareIdentity {
                identity,
                op,
                value,
            } => PredicateRef::CompareIdentity {
                identity,
                op,
                value,
            },
            Predicate::And { of } => PredicateRef::And {
                of: of.into_iter().map(Into::into).collect(),
            },
            Predicate::Or { of } => PredicateRef::Or {
                of: of.into_iter().map(Into::into).collect(),
            },
            Predicate::Not { predicate } => PredicateRef::Not {
                predicate: Box::new((*predicate).into()),
            },
            Predicate::Exists {
                relationship,
                predicate,
            } => PredicateRef::Exists {
                relationship,
                predicate: Box::new((*predicate).into()),
            },
            Predicate::AllowAll => PredicateRef::AllowAll,
            Predicate::DenyAll => PredicateRef::DenyAll,
        }
    }
}

impl PredicateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a named predicate.
    pub fn define(&mut self, name: impl Into<String>, predicate: impl Into<PredicateRef>) {
        self.defs.insert(name.into(), predicate.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    /// Fully expanded predicate for `name`.
    pub fn get(&self, name: &str) -> Result<Predicate> {
        self.expand(&PredicateRef::Use {
            name: name.to_string(),
        })
    }

    /// Replace every named reference in `predicate` with its definition.
    pub fn expand(&self, predicate: &PredicateRef) -> Result<Predicate> {
        self.expand_in(predicate, &mut BTreeSet::new())
    }

    fn expand_in<'a>(
        &'a self,
        predicate: &'a PredicateRef,
        active: &mut BTreeSet<&'a str>,
    ) -> Result<Predicate> {
        let expanded = match predicate {
            PredicateRef::Use { name } => {
                let def = self
                    .defs
                    .get(name)
                    .ok_or_else(|| Error::UnknownPredicate(name.clone()))?;
                if !active.insert(name.as_str()) {
                    return Err(Error::PredicateCycle(name.clone()));
                }
                let out = self.expand_in(def, active)?;
                active.remove(name.as_str());
                out
            }
            PredicateRef::Compare { field, op, value } => cmp(field.as_str(), *op, value.clone()),
            PredicateRef::CompareToIdentity {
                identity,
                op,
                field,
            } => cmp_identity(*identity, *op, field.as_str()),
            PredicateRef::CompareIdentity {
                identity,
                op,
                value,
            } => identity_is(*identity, *op, value.clone()),
            PredicateRef::And { of } => and(self.expand_all(of, active)?),
            PredicateRef::Or { of } => or(self.expand_all(of, active)?),
            PredicateRef::Not { predicate } => not(self.expand_in(predicate, active)?),
            PredicateRef::Exists {
                relationship,
                predicate,
            } => exists(relationship.as_str(), self.expand_in(predicate, active)?),
            PredicateRef::AllowAll => Predicate::AllowAll,
            PredicateRef::DenyAll => Predicate::DenyAll,
        };
        Ok(expanded)
    }

    fn expand_all<'a>(
        &'a self,
        children: &'a [PredicateRef],
        active: &mut BTreeSet<&'a str>,
    ) -> Result<Vec<Predicate>> {
        children
            .iter()
            .map(|child| self.expand_in(child, active))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn use_(name: &str) -> PredicateRef {
        PredicateRef::Use { name: name.into() }
    }

    #[test]
    fn test_is_creator_shape() {
        assert_eq!(
            is_creator(),
            and([
                identity_is(IdentityField::Subject, Op::IsNot, Value::Null),
                cmp_identity(IdentityField::Subject, Op::Eq, "creator_id"),
            ])
        );
    }

    #[test]
    fn test_library_expands_references() {
        let mut lib = PredicateLibrary::new();
        lib.define("can_see_task", logged_in());
        lib.define(
            "can_see_comment",
            PredicateRef::Exists {
                relationship: "task".into(),
                predicate: Box::new(use_("can_see_task")),
            },
        );

        assert_eq!(lib.get("can_see_comment").unwrap(), exists("task", logged_in()));
    }

    #[test]
    fn test_library_unknown_name() {
        let lib = PredicateLibrary::new();
        assert!(matches!(lib.get("can_see_task"), Err(Error::UnknownPredicate(n)) if n == "can_see_task"));
    }

    #[test]
    fn test_library_rejects_cycles() {
        let mut lib = PredicateLibrary::new();
        lib.define("a", PredicateRef::And { of: vec![use_("b")] });
        lib.define("b", PredicateRef::Not { predicate: Box::new(use_("a")) });

        assert!(matches!(lib.get("a"), Err(Error::PredicateCycle(_))));
    }

    #[test]
    fn test_library_allows_shared_references() {
        // The same name used twice side by side is not a cycle.
        let mut lib = PredicateLibrary::new();
        lib.define("logged_in", logged_in());
        lib.define("twice", PredicateRef::Or { of: vec![use_("logged_in"), use_("logged_in")] });

        assert_eq!(lib.get("twice").unwrap(), or([logged_in(), logged_in()]));
    }
}
