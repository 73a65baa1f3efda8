//! Row-level authorization rules and their evaluation.
//!
//! Core principle: **a mutation is allowed only by an explicit rule.** A
//! phase with no rule set denies.
//!
//! # Overview
//!
//! - [`Predicate`] is a closed, serializable condition tree. Identity values
//!   enter only at evaluation time, so predicates carry no hidden state.
//! - [`compose`] has constructors and named building blocks
//!   (`is_creator`, `is_elevated`, ...) plus a [`compose::PredicateLibrary`]
//!   of named predicates.
//! - [`RuleBook`] maps `(table, phase)` to a [`RuleSet`]: the explicit
//!   [`RuleSet::Nobody`] sentinel or an ordered list of predicates, any one
//!   of which allows.
//! - [`Evaluator`] interprets rule sets against a row, following
//!   relationships through a [`TraversalProvider`].
//! - [`Authorizer`] runs a [`Mutation`] through the insert / update-pre /
//!   update-post / delete phases and returns a [`Verdict`].
//! - [`Policy`] loads all of the above from TOML.
//!
//! # Example
//!
//! ```
//! use policy::compose::{is_creator, is_elevated};
//! use policy::{Authorizer, Evaluator, Identity, MemoryProvider, Mutation, Phase, RuleBook};
//! use schema::{Column, ColumnType, Row, Schema};
//!
//! let mut builder = Schema::builder();
//! builder.define_table(
//!     "task",
//!     vec![
//!         Column::new("id", ColumnType::String),
//!         Column::new("creator_id", ColumnType::String),
//!     ],
//!     "id",
//! )?;
//! let schema = builder.build()?;
//!
//! let mut rules = RuleBook::new();
//! rules
//!     .allow("task", Phase::UpdatePre, [is_creator(), is_elevated()])
//!     .allow("task", Phase::UpdatePost, [is_creator(), is_elevated()]);
//!
//! let auth = Authorizer::new(Evaluator::new(schema, rules)?);
//! let handoff = Mutation::Update {
//!     table: "task".into(),
//!     current: Row::new().with("id", "t1").with("creator_id", "u1"),
//!     diff: Row::new().with("creator_id", "u2"),
//! };
//!
//! // The creator may edit, but not give the task away.
//! let verdict = auth.authorize(&Identity::standard("u1"), &handoff, &MemoryProvider::new())?;
//! assert!(!verdict.is_commit());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compose;
mod error;
mod evaluator;
mod identity;
mod mutation;
mod policy;
mod predicate;
mod provider;
mod rules;

pub use error::{Error, Result};
pub use evaluator::{Decision, DenyReason, Evaluator};
pub use identity::{Identity, IdentityField, Role};
pub use mutation::{Authorizer, Mutation, Verdict};
pub use policy::{
    ColumnDecl, HopsDecl, PhaseDecl, Policy, PolicyFile, RuleDecl, Sentinel, TableDecl,
    TableRulesDecl,
};
pub use predicate::{Op, Predicate};
pub use provider::{MemoryProvider, ProviderError, TraversalProvider};
pub use rules::{Phase, RuleBook, RuleSet};
