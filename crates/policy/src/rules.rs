//! Rule sets per table and mutation phase.

use crate::{Error, Predicate, Result};
use schema::{Schema, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Point in a row's lifecycle at which a rule set is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Insert,
    /// Evaluated against the current row before an update.
    UpdatePre,
    /// Evaluated against the candidate row an update would produce.
    UpdatePost,
    Delete,
    /// Read visibility.
    Select,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Insert,
        Phase::UpdatePre,
        Phase::UpdatePost,
        Phase::Delete,
        Phase::Select,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Insert => "insert",
            Phase::UpdatePre => "update_pre",
            Phase::UpdatePost => "update_post",
            Phase::Delete => "delete",
            Phase::Select => "select",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared rule set.
///
/// An undeclared phase and [`RuleSet::Nobody`] both deny; they are kept
/// apart so tooling can flag the former.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Explicitly nobody may perform this phase.
    Nobody,
    /// Allowed when any predicate holds. Never empty.
    AnyOf(Vec<Predicate>),
}

impl RuleSet {
    /// Rule set allowing when any of `predicates` holds. An empty list is
    /// the same as [`RuleSet::Nobody`].
    pub fn any_of(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        if predicates.is_empty() {
            RuleSet::Nobody
        } else {
            RuleSet::AnyOf(predicates)
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            RuleSet::Nobody => &[],
            RuleSet::AnyOf(p) => p,
        }
    }
}

/// All declared rule sets, keyed by table then phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleBook {
    tables: BTreeMap<String, BTreeMap<Phase, RuleSet>>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the rule set for `(table, phase)`, replacing any earlier one.
    pub fn declare(&mut self, table: impl Into<String>, phase: Phase, rules: RuleSet) -> &mut Self {
        self.tables.entry(table.into()).or_default().insert(phase, rules);
        self
    }

    /// Shorthand for `declare(table, phase, RuleSet::any_of(predicates))`.
    pub fn allow(
        &mut self,
        table: impl Into<String>,
        phase: Phase,
        predicates: impl IntoIterator<Item = Predicate>,
    ) -> &mut Self {
        self.declare(table, phase, RuleSet::any_of(predicates))
    }

    /// Shorthand for `declare(table, phase, RuleSet::Nobody)`.
    pub fn nobody(&mut self, table: impl Into<String>, phase: Phase) -> &mut Self {
        self.declare(table, phase, RuleSet::Nobody)
    }

    pub fn get(&self, table: &str, phase: Phase) -> Option<&RuleSet> {
        self.tables.get(table).and_then(|phases| phases.get(&phase))
    }

    /// Declared rule sets of `table`, in phase order.
    pub fn table(&self, table: &str) -> impl Iterator<Item = (Phase, &RuleSet)> {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|phases| phases.iter().map(|(p, r)| (*p, r)))
    }

    /// `(table, phase)` pairs of `schema` with no declared rule set. These
    /// are implicit denials.
    pub fn undeclared<'a>(&'a self, schema: &'a Schema) -> impl Iterator<Item = (&'a str, Phase)> {
        schema.tables().flat_map(move |table| {
            Phase::ALL
                .into_iter()
                .filter(move |phase| self.get(table.name(), *phase).is_none())
                .map(move |phase| (table.name(), phase))
        })
    }

    /// Check every rule against `schema`: tables exist, referenced fields
    /// are columns of the table they are read from, relationships resolve
    /// and `and`/`or` nodes have children.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for (name, phases) in &self.tables {
            let table = schema.table(name)?;
            for (phase, rules) in phases {
                for predicate in rules.predicates() {
                    check(schema, table, *phase, predicate)?;
                }
            }
        }
        Ok(())
    }
}

fn check(schema: &Schema, table: &Table, phase: Phase, predicate: &Predicate) -> Result<()> {
    match predicate {
        Predicate::Compare { field, .. } | Predicate::CompareToIdentity { field, .. } => {
            if !table.has_column(field) {
                return Err(Error::UnknownColumn {
                    table: table.name().to_string(),
                    column: field.clone(),
                });
            }
        }
        Predicate::And { of } | Predicate::Or { of } => {
            if of.is_empty() {
                return Err(Error::EmptyCombinator {
                    table: table.name().to_string(),
                    phase,
                });
            }
            for child in of {
                check(schema, table, phase, child)?;
            }
        }
        Predicate::Not { predicate } => check(schema, table, phase, predicate)?,
        Predicate::Exists {
            relationship,
            predicate,
        } => {
            let relationship = schema.resolve(table.name(), relationship)?;
            let target = schema.table(relationship.target())?;
            check(schema, target, phase, predicate)?;
        }
        Predicate::CompareIdentity { .. } | Predicate::AllowAll | Predicate::DenyAll => {}
    }
    Ok(())
}
