//! Relationship traversal.

use schema::{Relationship, Row};
use std::collections::BTreeMap;
use thiserror::Error;

/// The provider could not produce related rows.
#[derive(Debug, Error)]
#[error("traversal of `{relationship}` failed: {source}")]
pub struct ProviderError {
    pub relationship: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ProviderError {
    pub fn new(
        relationship: &Relationship,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            relationship: format!("{}.{}", relationship.source(), relationship.name()),
            source: source.into(),
        }
    }
}

/// Resolves a relationship on a row to its related rows.
///
/// This is the only place evaluation touches stored data. An implementation
/// must present one consistent view for the whole of an evaluation call,
/// and must return an empty list (not an error) when nothing matches.
pub trait TraversalProvider {
    /// Rows of `relationship.target()` reached from `row` by following every
    /// hop of `relationship`.
    fn related(&self, relationship: &Relationship, row: &Row) -> Result<Vec<Row>, ProviderError>;
}

/// Rows held in memory, keyed by table name.
///
/// Useful for tests and for callers that already hold the relevant rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    tables: BTreeMap<String, Vec<Row>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`MemoryProvider::insert`].
    pub fn with(mut self, table: impl Into<String>, row: Row) -> Self {
        self.insert(table, row);
        self
    }

    pub fn insert(&mut self, table: impl Into<String>, row: Row) {
        self.tables.entry(table.into()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl TraversalProvider for MemoryProvider {
    fn related(&self, relationship: &Relationship, row: &Row) -> Result<Vec<Row>, ProviderError> {
        let mut frontier = vec![row.clone()];
        for hop in relationship.hops() {
            let candidates = self.rows(&hop.dest_table);
            frontier = frontier
                .iter()
                .map(|from| from.get(&hop.source_field))
                .filter(|key| !key.is_null())
                .flat_map(move |key| {
                    candidates
                        .iter()
                        .filter(move |to| to.get(&hop.dest_field) == key)
                })
                .cloned()
                .collect();
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{Column, ColumnType, Hop, Schema, Value};

    fn schema() -> Schema {
        let strings = |names: &[&str]| -> Vec<Column> {
            names.iter().map(|n| Column::new(*n, ColumnType::String)).collect()
        };
        let mut builder = Schema::builder();
        builder
            .define_table("task", strings(&["id"]), "id")
            .unwrap()
            .define_table("task_tag", strings(&["task_id", "tag_id"]), ["task_id", "tag_id"])
            .unwrap()
            .define_table("tag", strings(&["id", "name"]), "id")
            .unwrap()
            .define_relationship(
                "task",
                "tags",
                vec![
                    Hop::new("id", "task_id", "task_tag"),
                    Hop::new("tag_id", "id", "tag"),
                ],
            )
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_junction_traversal() {
        let provider = MemoryProvider::new()
            .with("task_tag", Row::new().with("task_id", "t1").with("tag_id", "a"))
            .with("task_tag", Row::new().with("task_id", "t1").with("tag_id", "b"))
            .with("task_tag", Row::new().with("task_id", "t2").with("tag_id", "c"))
            .with("tag", Row::new().with("id", "a").with("name", "urgent"))
            .with("tag", Row::new().with("id", "b").with("name", "later"))
            .with("tag", Row::new().with("id", "c").with("name", "never"));

        let schema = schema();
        let tags = schema.resolve("task", "tags").unwrap();
        let related = provider.related(tags, &Row::new().with("id", "t1")).unwrap();

        let names: Vec<_> = related.iter().map(|r| r.get("name").clone()).collect();
        assert_eq!(names, vec![Value::from("urgent"), Value::from("later")]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let schema = schema();
        let tags = schema.resolve("task", "tags").unwrap();
        let provider = MemoryProvider::new();

        assert!(provider.related(tags, &Row::new().with("id", "t1")).unwrap().is_empty());
        // NULL keys never match.
        assert!(provider.related(tags, &Row::new()).unwrap().is_empty());
    }
}
