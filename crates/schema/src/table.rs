//! Table definitions.

use crate::{ColumnType, Error, Result, Row};
use serde::{Deserialize, Serialize};

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default)]
    pub optional: bool,
}

impl Column {
    /// A required (non-nullable) column.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    /// A nullable column.
    pub fn optional(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: true,
        }
    }
}

/// A primary key: one column or an ordered tuple of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(c) => vec![c.as_str()],
            PrimaryKey::Composite(cs) => cs.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl From<&str> for PrimaryKey {
    fn from(column: &str) -> Self {
        PrimaryKey::Single(column.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for PrimaryKey {
    fn from(columns: [&str; N]) -> Self {
        PrimaryKey::Composite(columns.iter().map(|c| c.to_string()).collect())
    }
}

/// A validated table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    primary_key: PrimaryKey,
}

impl Table {
    /// Validate and create a table.
    ///
    /// Fails if a column is declared twice, or if the primary key is empty,
    /// names a missing column, or names an optional column.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_key: impl Into<PrimaryKey>,
    ) -> Result<Self> {
        let name = name.into();
        let primary_key = primary_key.into();

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::DuplicateColumn {
                    table: name,
                    column: column.name.clone(),
                });
            }
        }

        let key_columns = primary_key.columns();
        if key_columns.is_empty() {
            return Err(Error::EmptyPrimaryKey(name));
        }
        for key in key_columns {
            match columns.iter().find(|c| c.name == key) {
                None => {
                    return Err(Error::MissingKeyColumn {
                        table: name,
                        column: key.to_string(),
                    });
                }
                Some(c) if c.optional => {
                    return Err(Error::NullableKeyColumn {
                        table: name,
                        column: key.to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// Check that `row` conforms to this table.
    ///
    /// Every column in the row must be declared, every required column must
    /// be present and non-null, and every non-null value must match its
    /// column type.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if let Some(unknown) = row.columns().find(|c| !self.has_column(c)) {
            return Err(self.invalid_row(format!("unknown column `{unknown}`")));
        }

        for column in &self.columns {
            let value = row.get(&column.name);
            match value.column_type() {
                None if !column.optional => {
                    return Err(self.invalid_row(format!(
                        "required column `{}` is null or missing",
                        column.name
                    )));
                }
                Some(ty) if ty != column.ty => {
                    return Err(self.invalid_row(format!(
                        "column `{}` expects {}, got {ty}",
                        column.name, column.ty
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn invalid_row(&self, reason: String) -> Error {
        Error::InvalidRow {
            table: self.name.clone(),
            reason,
        }
    }
}
