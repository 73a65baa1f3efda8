//! SQLite-backed row storage for authorization checks.
//!
//! Evaluating a rule that follows a relationship needs the related rows.
//! This crate keeps rows in SQLite and serves them to the evaluator through
//! a read snapshot, so every traversal of one authorization call sees the
//! same committed state.
//!
//! # Core Concepts
//!
//! ## Store
//!
//! The [`Store`] wraps a SQLite database opened in WAL mode. Tables are
//! created from a [`schema::Schema`] with [`Store::apply_schema`], and rows
//! are checked against their table before [`Store::insert`] writes them.
//!
//! ## Snapshot
//!
//! A [`Snapshot`] is a deferred read transaction pinned at creation. It
//! implements [`policy::TraversalProvider`], walking each hop of a
//! relationship with one indexed lookup per frontier row. NULL keys match
//! nothing. A snapshot borrows its store mutably, so no write can land
//! inside it and be rolled back with it.
//!
//! # Example
//!
//! ```no_run
//! use policy::{Authorizer, Identity, Mutation, Policy};
//! use schema::Row;
//! use storage::Store;
//!
//! let policy = Policy::load("warden.toml")?;
//! let mut store = Store::open("rows.db")?;
//! store.apply_schema(&policy.schema)?;
//!
//! let auth = Authorizer::new(policy.into_evaluator()?);
//! let mutation = Mutation::Insert {
//!     table: "task".into(),
//!     row: Row::new().with("id", "t1").with("creator_id", "u1"),
//! };
//!
//! let snapshot = store.snapshot(auth.evaluator().schema())?;
//! let verdict = auth.authorize(&Identity::standard("u1"), &mutation, &snapshot)?;
//! println!("{verdict:?}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{Snapshot, Store};
