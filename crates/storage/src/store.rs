//! SQLite row store and read snapshots.

use crate::{Error, Result};
use policy::{ProviderError, TraversalProvider};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Transaction, TransactionBehavior, params_from_iter};
use schema::{ColumnType, Relationship, Row, Schema, Table, Value};
use std::path::Path;

/// SQLite-backed row store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given path, in WAL mode so readers keep
    /// their snapshot while writers commit.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(%mode, "opened store");
        Ok(Self { conn })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create every table of `schema` that does not exist yet.
    pub fn apply_schema(&self, schema: &Schema) -> Result<()> {
        for table in schema.tables() {
            let mut defs: Vec<String> = table
                .columns()
                .iter()
                .map(|c| {
                    let ty = match c.ty {
                        ColumnType::String => "TEXT",
                        ColumnType::Number => "REAL",
                        ColumnType::Boolean => "INTEGER",
                    };
                    let null = if c.optional { "" } else { " NOT NULL" };
                    format!("{} {ty}{null}", quote(&c.name))
                })
                .collect();
            let key: Vec<String> = table.primary_key().columns().into_iter().map(quote).collect();
            defs.push(format!("PRIMARY KEY ({})", key.join(", ")));

            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} ({});",
                quote(table.name()),
                defs.join(", ")
            ))?;
            tracing::debug!(table = table.name(), "table ready");
        }
        Ok(())
    }

    /// Insert a row after checking it against its table.
    pub fn insert(&self, table: &Table, row: &Row) -> Result<()> {
        table.check_row(row)?;
        let columns: Vec<String> = table.columns().iter().map(|c| quote(&c.name)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let values = table.columns().iter().map(|c| to_sql(row.get(&c.name)));

        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table.name()),
                columns.join(", "),
                placeholders.join(", ")
            ),
            params_from_iter(values),
        )?;
        Ok(())
    }

    /// Start a read snapshot. Every traversal through the returned provider
    /// sees the database as of this call, whatever commits afterwards.
    ///
    /// The snapshot holds the store's connection exclusively, so the store
    /// cannot be written through while it is alive:
    ///
    /// ```compile_fail
    /// # use schema::{Row, Schema};
    /// # let schema = Schema::builder().build().unwrap();
    /// # let mut store = storage::Store::in_memory().unwrap();
    /// # let table = schema.table("tag").unwrap();
    /// let snapshot = store.snapshot(&schema).unwrap();
    /// store.insert(table, &Row::new()).unwrap();
    /// drop(snapshot);
    /// ```
    pub fn snapshot<'a>(&'a mut self, schema: &'a Schema) -> Result<Snapshot<'a>> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?;
        // A deferred transaction pins its snapshot at the first read.
        tx.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
        Ok(Snapshot { tx, schema })
    }
}

/// A point-in-time view of a [`Store`]. Read-only; rolled back on drop.
pub struct Snapshot<'a> {
    tx: Transaction<'a>,
    schema: &'a Schema,
}

impl Snapshot<'_> {
    /// Rows of `table` whose `column` equals `key`.
    pub fn rows_where(&self, table: &Table, column: &str, key: &Value) -> Result<Vec<Row>> {
        let columns: Vec<String> = table.columns().iter().map(|c| quote(&c.name)).collect();
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            columns.join(", "),
            quote(table.name()),
            quote(column)
        ))?;

        let mut rows = stmt.query([to_sql(key)])?;
        let mut out = Vec::new();
        while let Some(sql_row) = rows.next()? {
            let mut row = Row::new();
            for (i, column) in table.columns().iter().enumerate() {
                let value = from_sql(table, &column.name, column.ty, sql_row.get_ref(i)?)?;
                row.set(column.name.as_str(), value);
            }
            out.push(row);
        }
        Ok(out)
    }

    fn walk(&self, relationship: &Relationship, row: &Row) -> Result<Vec<Row>> {
        let mut frontier = vec![row.clone()];
        for hop in relationship.hops() {
            let dest = self.schema.table(&hop.dest_table)?;
            let mut next = Vec::new();
            for from in &frontier {
                let key = from.get(&hop.source_field);
                if key.is_null() {
                    continue;
                }
                next.extend(self.rows_where(dest, &hop.dest_field, key)?);
            }
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier)
    }
}

impl TraversalProvider for Snapshot<'_> {
    fn related(&self, relationship: &Relationship, row: &Row) -> std::result::Result<Vec<Row>, ProviderError> {
        self.walk(relationship, row)
            .map_err(|e| ProviderError::new(relationship, e))
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => SqlValue::Real(*n),
        Value::String(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(table: &Table, column: &str, ty: ColumnType, value: ValueRef<'_>) -> Result<Value> {
    let unsupported = |reason: &str| Error::UnsupportedValue {
        table: table.name().to_string(),
        column: column.to_string(),
        reason: reason.to_string(),
    };

    Ok(match (ty, value) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnType::Boolean, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (ColumnType::Number, ValueRef::Integer(i)) => Value::Number(i as f64),
        (ColumnType::Number, ValueRef::Real(f)) => Value::Number(f),
        (ColumnType::String, ValueRef::Text(t)) => Value::String(
            std::str::from_utf8(t)
                .map_err(|_| unsupported("text is not valid UTF-8"))?
                .to_string(),
        ),
        (_, ValueRef::Blob(_)) => return Err(unsupported("blob values are not supported")),
        (ty, _) => return Err(unsupported(&format!("stored value does not match {ty}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::compose::{and, exists, is_creator, logged_in};
    use policy::{Authorizer, Evaluator, Identity, Mutation, Phase, RuleBook};
    use schema::{Column, Hop};

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder
            .define_table(
                "task",
                vec![
                    Column::new("id", ColumnType::String),
                    Column::new("creator_id", ColumnType::String),
                    Column::optional("sort_order", ColumnType::Number),
                    Column::new("done", ColumnType::Boolean),
                ],
                "id",
            )
            .unwrap()
            .define_table(
                "task_tag",
                vec![
                    Column::new("task_id", ColumnType::String),
                    Column::new("tag_id", ColumnType::String),
                ],
                ["task_id", "tag_id"],
            )
            .unwrap()
            .define_table(
                "tag",
                vec![
                    Column::new("id", ColumnType::String),
                    Column::new("name", ColumnType::String),
                ],
                "id",
            )
            .unwrap()
            .define_relationship(
                "task",
                "tags",
                vec![
                    Hop::new("id", "task_id", "task_tag"),
                    Hop::new("tag_id", "id", "tag"),
                ],
            )
            .unwrap()
            .define_relationship("task_tag", "task", vec![Hop::new("task_id", "id", "task")])
            .unwrap();
        builder.build().unwrap()
    }

    fn task(id: &str, creator: &str) -> Row {
        Row::new()
            .with("id", id)
            .with("creator_id", creator)
            .with("done", false)
    }

    fn seeded(store: &Store, schema: &Schema) {
        store.apply_schema(schema).unwrap();
        let tasks = schema.table("task").unwrap();
        let task_tags = schema.table("task_tag").unwrap();
        let tags = schema.table("tag").unwrap();

        store.insert(tasks, &task("t1", "u1").with("sort_order", 2.0)).unwrap();
        store.insert(tags, &Row::new().with("id", "a").with("name", "urgent")).unwrap();
        store
            .insert(task_tags, &Row::new().with("task_id", "t1").with("tag_id", "a"))
            .unwrap();
    }

    #[test]
    fn test_round_trip_types() {
        let schema = schema();
        let mut store = Store::in_memory().unwrap();
        seeded(&store, &schema);

        let snapshot = store.snapshot(&schema).unwrap();
        let rows = snapshot
            .rows_where(schema.table("task").unwrap(), "id", &Value::from("t1"))
            .unwrap();
        assert_eq!(rows, vec![task("t1", "u1").with("sort_order", 2.0)]);
    }

    #[test]
    fn test_insert_rejects_invalid_row() {
        let schema = schema();
        let store = Store::in_memory().unwrap();
        store.apply_schema(&schema).unwrap();

        let err = store
            .insert(schema.table("task").unwrap(), &Row::new().with("id", "t1"))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(schema::Error::InvalidRow { .. })));
    }

    #[test]
    fn test_junction_traversal() {
        let schema = schema();
        let mut store = Store::in_memory().unwrap();
        seeded(&store, &schema);

        let snapshot = store.snapshot(&schema).unwrap();
        let tags = schema.resolve("task", "tags").unwrap();
        let related = snapshot.related(tags, &task("t1", "u1")).unwrap();
        assert_eq!(related, vec![Row::new().with("id", "a").with("name", "urgent")]);

        assert!(snapshot.related(tags, &task("t2", "u1")).unwrap().is_empty());
    }

    #[test]
    fn test_authorize_against_store() {
        let schema = schema();
        let mut store = Store::in_memory().unwrap();
        seeded(&store, &schema);

        let mut rules = RuleBook::new();
        rules.allow(
            "task_tag",
            Phase::Insert,
            [and([logged_in(), exists("task", is_creator())])],
        );
        let auth = Authorizer::new(Evaluator::new(schema.clone(), rules).unwrap());
        let tag = Mutation::Insert {
            table: "task_tag".into(),
            row: Row::new().with("task_id", "t1").with("tag_id", "b"),
        };

        let snapshot = store.snapshot(&schema).unwrap();
        assert!(auth.authorize(&Identity::standard("u1"), &tag, &snapshot).unwrap().is_commit());
        assert!(!auth.authorize(&Identity::standard("u2"), &tag, &snapshot).unwrap().is_commit());
    }

    #[test]
    fn test_snapshot_ignores_later_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.db");
        let schema = schema();

        let mut reader = Store::open(&path).unwrap();
        seeded(&reader, &schema);
        let writer = Store::open(&path).unwrap();

        let tags = schema.resolve("task", "tags").unwrap();
        let before = reader.snapshot(&schema).unwrap();

        writer
            .insert(schema.table("tag").unwrap(), &Row::new().with("id", "b").with("name", "later"))
            .unwrap();
        writer
            .insert(
                schema.table("task_tag").unwrap(),
                &Row::new().with("task_id", "t1").with("tag_id", "b"),
            )
            .unwrap();

        assert_eq!(before.related(tags, &task("t1", "u1")).unwrap().len(), 1);
        drop(before);

        let after = reader.snapshot(&schema).unwrap();
        assert_eq!(after.related(tags, &task("t1", "u1")).unwrap().len(), 2);
    }

    #[test]
    fn test_stored_value_type_mismatch_is_provider_failure() {
        let schema = schema();
        let mut store = Store::in_memory().unwrap();
        seeded(&store, &schema);
        store
            .conn
            .execute("UPDATE \"task\" SET \"done\" = 'yes' WHERE \"id\" = 't1'", [])
            .unwrap();

        let snapshot = store.snapshot(&schema).unwrap();
        let back = schema.resolve("task_tag", "task").unwrap();
        let err = snapshot
            .related(back, &Row::new().with("task_id", "t1").with("tag_id", "a"))
            .unwrap_err();
        assert_eq!(err.relationship, "task_tag.task");
    }

    #[test]
    fn test_writes_after_snapshot_persist() {
        let schema = schema();
        let mut store = Store::in_memory().unwrap();
        seeded(&store, &schema);
        let tags = schema.table("tag").unwrap();

        let snapshot = store.snapshot(&schema).unwrap();
        assert_eq!(snapshot.rows_where(tags, "id", &Value::from("b")).unwrap().len(), 0);
        drop(snapshot);

        store.insert(tags, &Row::new().with("id", "b").with("name", "later")).unwrap();
        let snapshot = store.snapshot(&schema).unwrap();
        let rows = snapshot.rows_where(tags, "id", &Value::from("b")).unwrap();
        assert_eq!(rows, vec![Row::new().with("id", "b").with("name", "later")]);
        drop(snapshot);

        // Nothing written is undone by closing the snapshot.
        let snapshot = store.snapshot(&schema).unwrap();
        assert_eq!(snapshot.rows_where(tags, "id", &Value::from("b")).unwrap().len(), 1);
    }
}
