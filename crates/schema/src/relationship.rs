//! Relationships between tables.

use serde::{Deserialize, Serialize};

/// One traversal step: rows of `dest_table` whose `dest_field` equals the
/// current row's `source_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub source_field: String,
    pub dest_field: String,
    pub dest_table: String,
}

impl Hop {
    pub fn new(
        source_field: impl Into<String>,
        dest_field: impl Into<String>,
        dest_table: impl Into<String>,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            dest_field: dest_field.into(),
            dest_table: dest_table.into(),
        }
    }
}

/// A named relationship from a source table.
///
/// Destination tables are held by name and looked up in the
/// [`Schema`](crate::Schema) when the relationship is used, so tables may
/// reference each other in cycles. With more than one hop, the destination
/// of hop *i* is the source of hop *i + 1* (a junction table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    source: String,
    name: String,
    hops: Vec<Hop>,
}

impl Relationship {
    pub(crate) fn new(source: String, name: String, hops: Vec<Hop>) -> Self {
        Self { source, name, hops }
    }

    /// The table this relationship starts from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// The table reached after the last hop.
    pub fn target(&self) -> &str {
        // Non-empty: the builder rejects relationships without hops.
        self.hops
            .last()
            .map(|h| h.dest_table.as_str())
            .unwrap_or(self.source.as_str())
    }
}
