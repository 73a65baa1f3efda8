//! Table and relationship registry for row-level authorization.
//!
//! A [`Schema`] is built once at startup from table and relationship
//! declarations and is read-only afterwards. Rules are validated against
//! it and the evaluator resolves relationships through it.
//!
//! # Example
//!
//! ```
//! use schema::{Column, ColumnType, Hop, Schema};
//!
//! let mut builder = Schema::builder();
//! builder
//!     .define_table(
//!         "task",
//!         vec![
//!             Column::new("id", ColumnType::String),
//!             Column::new("creator_id", ColumnType::String),
//!         ],
//!         "id",
//!     )?
//!     .define_relationship("task", "comments", vec![Hop::new("id", "task_id", "task_comment")])?
//!     .define_table(
//!         "task_comment",
//!         vec![
//!             Column::new("id", ColumnType::String),
//!             Column::new("task_id", ColumnType::String),
//!         ],
//!         "id",
//!     )?;
//!
//! let schema = builder.build()?;
//! assert_eq!(schema.resolve("task", "comments")?.target(), "task_comment");
//! # Ok::<(), schema::Error>(())
//! ```

mod error;
mod registry;
mod relationship;
mod table;
mod value;

pub use error::{Error, Result};
pub use registry::{Schema, SchemaBuilder};
pub use relationship::{Hop, Relationship};
pub use table::{Column, PrimaryKey, Table};
pub use value::{ColumnType, Row, Value};
