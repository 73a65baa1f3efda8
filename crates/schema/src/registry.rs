//! Schema registry.

use crate::{Column, Error, Hop, PrimaryKey, Relationship, Result, Table};
use std::collections::BTreeMap;

/// Collects table and relationship declarations in any order.
///
/// Declarations are checked locally as they arrive (duplicates, primary
/// keys). Cross-table references are only checked by [`SchemaBuilder::build`],
/// once every table is known, so relationships may point forward to tables
/// declared later and tables may reference each other cyclically.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: BTreeMap<String, Table>,
    relationships: BTreeMap<String, BTreeMap<String, Relationship>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table.
    pub fn define_table(
        &mut self,
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key: impl Into<PrimaryKey>,
    ) -> Result<&mut Self> {
        let table = Table::new(name, columns, primary_key)?;
        self.add_table(table)
    }

    /// Register an already-validated table.
    pub fn add_table(&mut self, table: Table) -> Result<&mut Self> {
        if self.tables.contains_key(table.name()) {
            return Err(Error::DuplicateTable(table.name().to_string()));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(self)
    }

    /// Register a relationship on `table`. Neither `table` nor the hop
    /// destinations need to be defined yet.
    pub fn define_relationship(
        &mut self,
        table: impl Into<String>,
        name: impl Into<String>,
        hops: Vec<Hop>,
    ) -> Result<&mut Self> {
        let table = table.into();
        let name = name.into();

        if hops.is_empty() {
            return Err(Error::EmptyRelationship { table, name });
        }

        let by_name = self.relationships.entry(table.clone()).or_default();
        if by_name.contains_key(&name) {
            return Err(Error::DuplicateRelationship { table, name });
        }
        by_name.insert(name.clone(), Relationship::new(table, name, hops));
        Ok(self)
    }

    /// Resolve every relationship against the declared tables and freeze
    /// the registry.
    pub fn build(self) -> Result<Schema> {
        for (table, by_name) in &self.relationships {
            if !self.tables.contains_key(table) {
                return Err(Error::UnknownTable(table.clone()));
            }
            for relationship in by_name.values() {
                self.check_hops(relationship)?;
            }
        }

        tracing::debug!(
            tables = self.tables.len(),
            relationships = self.relationships.values().map(BTreeMap::len).sum::<usize>(),
            "schema built"
        );

        Ok(Schema {
            tables: self.tables,
            relationships: self.relationships,
        })
    }

    fn check_hops(&self, relationship: &Relationship) -> Result<()> {
        let invalid = |hop: usize, reason: String| Error::InvalidHop {
            table: relationship.source().to_string(),
            name: relationship.name().to_string(),
            hop,
            reason,
        };

        let mut current = relationship.source();
        for (i, hop) in relationship.hops().iter().enumerate() {
            let from = &self.tables[current];
            let Some(source) = from.column(&hop.source_field) else {
                return Err(invalid(
                    i,
                    format!("source field `{}` is not a column of `{current}`", hop.source_field),
                ));
            };

            let Some(dest) = self.tables.get(&hop.dest_table) else {
                return Err(invalid(i, format!("unknown table `{}`", hop.dest_table)));
            };
            let Some(target) = dest.column(&hop.dest_field) else {
                return Err(invalid(
                    i,
                    format!(
                        "destination field `{}` is not a column of `{}`",
                        hop.dest_field, hop.dest_table
                    ),
                ));
            };
            // Keys of different types never join.
            if source.ty != target.ty {
                return Err(invalid(
                    i,
                    format!(
                        "`{current}.{}` is {} but `{}.{}` is {}",
                        hop.source_field, source.ty, hop.dest_table, hop.dest_field, target.ty
                    ),
                ));
            }
            current = dest.name();
        }
        Ok(())
    }
}

/// An immutable, validated schema. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: BTreeMap<String, Table>,
    relationships: BTreeMap<String, BTreeMap<String, Relationship>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Resolve a relationship to its hop chain.
    pub fn resolve(&self, table: &str, name: &str) -> Result<&Relationship> {
        self.table(table)?;
        self.relationships
            .get(table)
            .and_then(|by_name| by_name.get(name))
            .ok_or_else(|| Error::UnknownRelationship {
                table: table.to_string(),
                name: name.to_string(),
            })
    }

    /// Relationships declared on `table`, in name order.
    pub fn relationships(&self, table: &str) -> impl Iterator<Item = &Relationship> {
        self.relationships
            .get(table)
            .into_iter()
            .flat_map(BTreeMap::values)
    }
}
