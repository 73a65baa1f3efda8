//! Mutation authorization pipeline.
//!
//! Sequences rule-set evaluation around a proposed row change:
//!
//! - insert: `insert` against the candidate row.
//! - update: `update_pre` against the current row, then `update_post`
//!   against the current row with the diff applied. The candidate is only
//!   built once `update_pre` allows.
//! - delete: `delete` against the current row.
//!
//! Any denial rejects the whole mutation; nothing is partially applied.

use crate::{Decision, DenyReason, Error, Evaluator, Identity, Phase, Result, TraversalProvider};
use schema::Row;
use serde::{Deserialize, Serialize};

/// A proposed change to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Insert {
        table: String,
        row: Row,
    },
    Update {
        table: String,
        current: Row,
        /// Columns to overwrite.
        diff: Row,
    },
    Delete {
        table: String,
        current: Row,
    },
}

impl Mutation {
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }
}

/// Final outcome of a mutation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The mutation may be committed. `row` is the row after the change (the
    /// removed row for a delete).
    Commit { row: Row },
    /// Rejected at `phase`.
    Denied { phase: Phase, reason: DenyReason },
}

impl Verdict {
    pub fn is_commit(&self) -> bool {
        matches!(self, Verdict::Commit { .. })
    }
}

/// Runs mutations through the evaluator.
#[derive(Debug, Clone)]
pub struct Authorizer {
    evaluator: Evaluator,
}

impl Authorizer {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Decide whether `mutation` may be committed by `identity`.
    ///
    /// Rows are checked against their table before any rule runs. `provider`
    /// must give one consistent view for the whole call.
    pub fn authorize(
        &self,
        identity: &Identity,
        mutation: &Mutation,
        provider: &dyn TraversalProvider,
    ) -> Result<Verdict> {
        let table = self.evaluator.schema().table(mutation.table())?;

        let verdict = match mutation {
            Mutation::Insert { row, .. } => {
                table.check_row(row)?;
                self.phase(table.name(), Phase::Insert, identity, row, provider)?
            }
            Mutation::Update { current, diff, .. } => {
                table.check_row(current)?;
                if let Some(column) = diff.columns().find(|c| !table.has_column(c)) {
                    return Err(Error::InvalidMutation(format!(
                        "update of `{}` names unknown column `{column}`",
                        table.name()
                    )));
                }
                if let Some(column) = diff
                    .iter()
                    .find(|(c, v)| table.primary_key().contains(c) && *v != current.get(c))
                    .map(|(c, _)| c)
                {
                    return Err(Error::InvalidMutation(format!(
                        "update of `{}` changes primary key column `{column}`",
                        table.name()
                    )));
                }

                let pre = self.evaluator.evaluate(
                    table.name(),
                    Phase::UpdatePre,
                    identity,
                    current,
                    provider,
                )?;
                if let Decision::Deny { reason } = pre {
                    return Ok(self.denied(table.name(), Phase::UpdatePre, reason));
                }

                let candidate = current.merged(diff);
                table.check_row(&candidate)?;
                self.phase(table.name(), Phase::UpdatePost, identity, &candidate, provider)?
            }
            Mutation::Delete { current, .. } => {
                table.check_row(current)?;
                self.phase(table.name(), Phase::Delete, identity, current, provider)?
            }
        };
        Ok(verdict)
    }

    /// Whether `identity` may read `row`.
    pub fn can_read(
        &self,
        table: &str,
        identity: &Identity,
        row: &Row,
        provider: &dyn TraversalProvider,
    ) -> Result<Decision> {
        self.evaluator
            .evaluate(table, Phase::Select, identity, row, provider)
    }

    /// Evaluate one phase; on allow, `row` is what gets committed.
    fn phase(
        &self,
        table: &str,
        phase: Phase,
        identity: &Identity,
        row: &Row,
        provider: &dyn TraversalProvider,
    ) -> Result<Verdict> {
        match self.evaluator.evaluate(table, phase, identity, row, provider)? {
            Decision::Allow => Ok(Verdict::Commit { row: row.clone() }),
            Decision::Deny { reason } => Ok(self.denied(table, phase, reason)),
        }
    }

    fn denied(&self, table: &str, phase: Phase, reason: DenyReason) -> Verdict {
        tracing::debug!(table, %phase, ?reason, "mutation rejected");
        Verdict::Denied { phase, reason }
    }
}
