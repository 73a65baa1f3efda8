//! Permission evaluation.

use crate::{Error, Identity, Phase, Predicate, Result, RuleBook, RuleSet, TraversalProvider};
use schema::{Row, Schema};
use serde::Serialize;

/// Why a rule set denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No rule set is declared for the phase.
    Undeclared,
    /// The rule set is the explicit "nobody" sentinel.
    Nobody,
    /// No predicate in the rule set held.
    NoRuleMatched,
}

/// Result of evaluating one rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny { reason: DenyReason },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Evaluates rule sets against rows.
///
/// Holds the schema and a rule book validated against it; both are
/// read-only, so one evaluator can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    schema: Schema,
    rules: RuleBook,
}

impl Evaluator {
    /// Validate `rules` against `schema` and build an evaluator.
    pub fn new(schema: Schema, rules: RuleBook) -> Result<Self> {
        rules.validate(&schema)?;
        tracing::info!(
            tables = schema.tables().count(),
            undeclared = rules.undeclared(&schema).count(),
            "rule book loaded"
        );
        Ok(Self { schema, rules })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Evaluate the rule set for `(table, phase)` against `row`.
    ///
    /// Predicates are tried in declaration order and the first that holds
    /// allows. A missing rule set denies. Provider failures are returned as
    /// errors, never as a decision.
    pub fn evaluate(
        &self,
        table: &str,
        phase: Phase,
        identity: &Identity,
        row: &Row,
        provider: &dyn TraversalProvider,
    ) -> Result<Decision> {
        self.schema.table(table)?;

        let decision = match self.rules.get(table, phase) {
            None => Decision::Deny {
                reason: DenyReason::Undeclared,
            },
            Some(RuleSet::Nobody) => Decision::Deny {
                reason: DenyReason::Nobody,
            },
            Some(RuleSet::AnyOf(predicates)) => {
                let mut decision = Decision::Deny {
                    reason: DenyReason::NoRuleMatched,
                };
                for predicate in predicates {
                    if self.holds(table, predicate, identity, row, provider)? {
                        decision = Decision::Allow;
                        break;
                    }
                }
                decision
            }
        };

        tracing::debug!(
            table,
            %phase,
            subject = ?identity.subject,
            role = %identity.role,
            ?decision,
            "rule set evaluated"
        );
        Ok(decision)
    }

    /// Interpret one predicate against `row`, a row of `table`.
    pub fn holds(
        &self,
        table: &str,
        predicate: &Predicate,
        identity: &Identity,
        row: &Row,
        provider: &dyn TraversalProvider,
    ) -> Result<bool> {
        match predicate {
            Predicate::Compare { field, op, value } => Ok(op.apply(row.get(field), value)),
            Predicate::CompareToIdentity {
                identity: field_of,
                op,
                field,
            } => Ok(op.apply(&identity.field(*field_of), row.get(field))),
            Predicate::CompareIdentity {
                identity: field_of,
                op,
                value,
            } => Ok(op.apply(&identity.field(*field_of), value)),
            Predicate::And { of } => {
                for child in of {
                    if !self.holds(table, child, identity, row, provider)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or { of } => {
                for child in of {
                    if self.holds(table, child, identity, row, provider)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not { predicate } => {
                Ok(!self.holds(table, predicate, identity, row, provider)?)
            }
            Predicate::Exists {
                relationship,
                predicate,
            } => {
                let relationship = self.schema.resolve(table, relationship)?;
                let related = provider.related(relationship, row).map_err(Error::Provider)?;
                for candidate in &related {
                    if self.holds(relationship.target(), predicate, identity, candidate, provider)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::AllowAll => Ok(true),
            Predicate::DenyAll => Ok(false),
        }
    }
}
