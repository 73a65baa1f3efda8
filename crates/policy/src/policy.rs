//! Policy declarations loaded from TOML.
//!
//! ```toml
//! [tables.task]
//! primary_key = "id"
//! columns = { id = "string", creator_id = "string", team_id = { type = "string", optional = true } }
//! relationships.comments = { source_field = "id", dest_field = "task_id", dest_table = "task_comment" }
//!
//! [predicates.is_creator]
//! kind = "compare_to_identity"
//! identity = "subject"
//! op = "="
//! field = "creator_id"
//!
//! [rules.task]
//! insert = ["is_creator"]
//! delete = "nobody"
//! ```

use crate::compose::{PredicateLibrary, PredicateRef};
use crate::{Error, Evaluator, Phase, Result, RuleBook, RuleSet};
use schema::{Column, ColumnType, Hop, PrimaryKey, Schema};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Raw policy document, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyFile {
    /// Table declarations.
    #[serde(default)]
    pub tables: BTreeMap<String, TableDecl>,

    /// Named, reusable predicates.
    #[serde(default)]
    pub predicates: BTreeMap<String, PredicateRef>,

    /// Rule sets per table.
    #[serde(default)]
    pub rules: BTreeMap<String, TableRulesDecl>,
}

/// A table as written in the policy file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDecl {
    pub primary_key: PrimaryKey,
    pub columns: BTreeMap<String, ColumnDecl>,
    #[serde(default)]
    pub relationships: BTreeMap<String, HopsDecl>,
}

/// `"string"` or `{ type = "string", optional = true }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnDecl {
    Type(ColumnType),
    Detailed {
        #[serde(rename = "type")]
        ty: ColumnType,
        #[serde(default)]
        optional: bool,
    },
}

/// A single hop or an ordered list of hops.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HopsDecl {
    One(Hop),
    Many(Vec<Hop>),
}

/// Rule sets of one table. A missing key is an implicit deny.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableRulesDecl {
    pub insert: Option<PhaseDecl>,
    pub update_pre: Option<PhaseDecl>,
    pub update_post: Option<PhaseDecl>,
    pub delete: Option<PhaseDecl>,
    pub select: Option<PhaseDecl>,
}

/// `"nobody"` or a list of predicate names / inline predicates.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PhaseDecl {
    Sentinel(Sentinel),
    Rules(Vec<RuleDecl>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentinel {
    Nobody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleDecl {
    Named(String),
    Inline(PredicateRef),
}

/// A validated policy: schema, named predicates and rule book.
#[derive(Debug, Clone)]
pub struct Policy {
    pub schema: Schema,
    pub library: PredicateLibrary,
    pub rules: RuleBook,
}

impl Policy {
    /// Load policy from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse policy from TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let file: PolicyFile = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    /// Build and validate a policy from its declarations.
    pub fn from_file(file: PolicyFile) -> Result<Self> {
        let mut builder = Schema::builder();
        for (name, table) in &file.tables {
            let columns = table
                .columns
                .iter()
                .map(|(column, decl)| match decl {
                    ColumnDecl::Type(ty) => Column::new(column.as_str(), *ty),
                    ColumnDecl::Detailed { ty, optional } => Column {
                        name: column.clone(),
                        ty: *ty,
                        optional: *optional,
                    },
                })
                .collect();
            builder.define_table(name.as_str(), columns, table.primary_key.clone())?;

            for (relationship, hops) in &table.relationships {
                let hops = match hops {
                    HopsDecl::One(hop) => vec![hop.clone()],
                    HopsDecl::Many(hops) => hops.clone(),
                };
                builder.define_relationship(name.as_str(), relationship.as_str(), hops)?;
            }
        }
        let schema = builder.build()?;

        let mut library = PredicateLibrary::new();
        for (name, predicate) in file.predicates {
            library.define(name, predicate);
        }
        // Expand every definition so unknown names and cycles fail at load
        // even when no rule uses them.
        for name in library.names() {
            library.get(name)?;
        }

        let mut rules = RuleBook::new();
        for (table, decl) in &file.rules {
            let phases = [
                (Phase::Insert, &decl.insert),
                (Phase::UpdatePre, &decl.update_pre),
                (Phase::UpdatePost, &decl.update_post),
                (Phase::Delete, &decl.delete),
                (Phase::Select, &decl.select),
            ];
            for (phase, decl) in phases {
                let Some(decl) = decl else { continue };
                rules.declare(table.as_str(), phase, rule_set(&library, decl)?);
            }
        }
        rules.validate(&schema)?;

        Ok(Self {
            schema,
            library,
            rules,
        })
    }

    /// Build an evaluator over this policy.
    pub fn into_evaluator(self) -> Result<Evaluator> {
        Evaluator::new(self.schema, self.rules)
    }
}

fn rule_set(library: &PredicateLibrary, decl: &PhaseDecl) -> Result<RuleSet> {
    match decl {
        PhaseDecl::Sentinel(Sentinel::Nobody) => Ok(RuleSet::Nobody),
        PhaseDecl::Rules(entries) => {
            let predicates = entries
                .iter()
                .map(|entry| match entry {
                    RuleDecl::Named(name) => library.get(name),
                    RuleDecl::Inline(predicate) => library.expand(predicate),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RuleSet::any_of(predicates))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{exists, is_creator, logged_in};
    use crate::{DenyReason, Identity, MemoryProvider, Predicate};
    use schema::Row;

    const MINIMAL: &str = r#"
[tables.task]
primary_key = "id"
columns = { id = "string", creator_id = "string", team_id = { type = "string", optional = true } }
relationships.comments = { source_field = "id", dest_field = "task_id", dest_table = "task_comment" }

[tables.task_comment]
primary_key = "id"
columns = { id = "string", task_id = "string", creator_id = "string" }
relationships.task = [{ source_field = "task_id", dest_field = "id", dest_table = "task" }]

[predicates.logged_in]
kind = "identity"
identity = "subject"
op = "IS NOT"

[predicates.is_creator]
kind = "and"
of = [
    { kind = "use", name = "logged_in" },
    { kind = "compare_to_identity", identity = "subject", op = "=", field = "creator_id" },
]

[predicates.can_see_comment]
kind = "exists"
relationship = "task"
where = { kind = "use", name = "logged_in" }

[rules.task]
insert = ["is_creator"]
delete = "nobody"

[rules.task_comment]
insert = [{ kind = "and", of = [{ kind = "use", name = "is_creator" }, { kind = "use", name = "can_see_comment" }] }]
update_pre = []
"#;

    #[test]
    fn test_parse_toml() {
        let policy = Policy::parse(MINIMAL).unwrap();

        let task = policy.schema.table("task").unwrap();
        assert!(task.column("team_id").unwrap().optional);
        assert!(!task.column("creator_id").unwrap().optional);
        assert_eq!(policy.schema.resolve("task_comment", "task").unwrap().target(), "task");

        assert_eq!(
            policy.rules.get("task", Phase::Insert),
            Some(&RuleSet::AnyOf(vec![is_creator()]))
        );
        assert_eq!(policy.rules.get("task", Phase::Delete), Some(&RuleSet::Nobody));
        assert_eq!(policy.rules.get("task_comment", Phase::UpdatePre), Some(&RuleSet::Nobody));
        assert_eq!(policy.rules.get("task", Phase::Select), None);
        assert_eq!(
            policy.library.get("can_see_comment").unwrap(),
            exists("task", logged_in())
        );
    }

    #[test]
    fn test_parsed_policy_evaluates() {
        let eval = Policy::parse(MINIMAL).unwrap().into_evaluator().unwrap();
        let provider = MemoryProvider::new()
            .with("task", Row::new().with("id", "t1").with("creator_id", "u2"));
        let comment = Row::new()
            .with("id", "c1")
            .with("task_id", "t1")
            .with("creator_id", "u1");

        let as_author = eval
            .evaluate("task_comment", Phase::Insert, &Identity::standard("u1"), &comment, &provider)
            .unwrap();
        assert!(as_author.is_allowed());

        let orphan = comment.clone().with("task_id", "t404");
        let decision = eval
            .evaluate("task_comment", Phase::Insert, &Identity::standard("u1"), &orphan, &provider)
            .unwrap();
        assert_eq!(decision, crate::Decision::Deny { reason: DenyReason::NoRuleMatched });
    }

    #[test]
    fn test_exists_without_where_means_any_row() {
        let toml = r#"
[tables.a]
primary_key = "id"
columns = { id = "string", b_id = "string" }
relationships.b = { source_field = "b_id", dest_field = "id", dest_table = "b" }

[tables.b]
primary_key = "id"
columns = { id = "string", a_id = "string" }
relationships.a = { source_field = "a_id", dest_field = "id", dest_table = "a" }

[rules.a]
select = [{ kind = "exists", relationship = "b" }]
"#;
        let policy = Policy::parse(toml).unwrap();
        assert_eq!(
            policy.rules.get("a", Phase::Select),
            Some(&RuleSet::AnyOf(vec![exists("b", Predicate::AllowAll)]))
        );
    }

    #[test]
    fn test_load_errors() {
        let missing_key = r#"
[tables.tag]
primary_key = "tag_id"
columns = { id = "string" }
"#;
        assert!(matches!(
            Policy::parse(missing_key),
            Err(Error::Schema(schema::Error::MissingKeyColumn { .. }))
        ));

        let unknown_predicate = r#"
[tables.tag]
primary_key = "id"
columns = { id = "string" }

[rules.tag]
insert = ["is_admin"]
"#;
        assert!(matches!(
            Policy::parse(unknown_predicate),
            Err(Error::UnknownPredicate(name)) if name == "is_admin"
        ));

        let unknown_phase = r#"
[tables.tag]
primary_key = "id"
columns = { id = "string" }

[rules.tag]
update = "nobody"
"#;
        assert!(matches!(Policy::parse(unknown_phase), Err(Error::Parse(_))));

        let misspelled_relationships = r#"
[tables.tag]
primary_key = "id"
columns = { id = "string", task_id = "string" }
relationship.task = { source_field = "task_id", dest_field = "id", dest_table = "tag" }
"#;
        assert!(matches!(
            Policy::parse(misspelled_relationships),
            Err(Error::Parse(msg)) if msg.contains("relationship")
        ));

        let cycle = r#"
[predicates.a]
kind = "not"
predicate = { kind = "use", name = "b" }

[predicates.b]
kind = "use"
name = "a"
"#;
        assert!(matches!(Policy::parse(cycle), Err(Error::PredicateCycle(_))));

        let bad_field = r#"
[tables.tag]
primary_key = "id"
columns = { id = "string" }

[rules.tag]
insert = [{ kind = "compare", field = "name", op = "=", value = "urgent" }]
"#;
        assert!(matches!(Policy::parse(bad_field), Err(Error::UnknownColumn { .. })));
    }

    #[test]
    fn test_demo_policy() {
        use crate::{Authorizer, Mutation, Verdict};

        let policy = Policy::parse(include_str!("../../../warden.toml")).unwrap();
        assert_eq!(policy.schema.tables().count(), 14);
        assert_eq!(policy.schema.resolve("task", "tags").unwrap().target(), "tag");

        // Membership tables carry no rules yet.
        let implicit: Vec<_> = policy.rules.undeclared(&policy.schema).collect();
        assert!(implicit.contains(&("team_member", Phase::Insert)));
        assert!(!implicit.iter().any(|(table, _)| *table == "task"));

        let auth = Authorizer::new(policy.into_evaluator().unwrap());
        let task = Row::new()
            .with("id", "t1")
            .with("title", "Ship it")
            .with("description", "")
            .with("start", "today")
            .with("start_bucket", "day")
            .with("created_at", 1.0)
            .with("updated_at", 1.0)
            .with("creator_id", "u1");
        let provider = MemoryProvider::new().with("task", task.clone());
        let tag = Mutation::Insert {
            table: "task_tag".into(),
            row: Row::new().with("task_id", "t1").with("tag_id", "a"),
        };

        let creator = auth.authorize(&Identity::standard("u1"), &tag, &provider).unwrap();
        assert!(creator.is_commit());
        let admin = auth.authorize(&Identity::elevated("u9"), &tag, &provider).unwrap();
        assert!(admin.is_commit());
        assert_eq!(
            auth.authorize(&Identity::standard("u2"), &tag, &provider).unwrap(),
            Verdict::Denied {
                phase: Phase::Insert,
                reason: DenyReason::NoRuleMatched
            }
        );

        let user = Mutation::Delete {
            table: "user".into(),
            current: Row::new()
                .with("id", "u1")
                .with("login", "u1")
                .with("role", "user")
                .with("githubID", 1.0)
                .with("created_at", 1.0)
                .with("updated_at", 1.0),
        };
        assert_eq!(
            auth.authorize(&Identity::elevated("u9"), &user, &provider).unwrap(),
            Verdict::Denied {
                phase: Phase::Delete,
                reason: DenyReason::Nobody
            }
        );

        let reader = auth.can_read("task", &Identity::standard("u2"), &task, &provider);
        assert!(reader.unwrap().is_allowed());
        let anonymous = auth.can_read("task", &Identity::anonymous(), &task, &provider);
        assert!(!anonymous.unwrap().is_allowed());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let policy = Policy::load(&path).unwrap();
        assert!(policy.schema.table("task_comment").is_ok());

        let missing = dir.path().join("absent.toml");
        assert!(matches!(Policy::load(&missing), Err(Error::Io(_))));
    }
}
