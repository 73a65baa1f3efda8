//! Caller identity.

use schema::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role classifier of an authenticated caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Standard,
    Elevated,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Elevated => "elevated",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The already-authenticated caller a mutation is evaluated for.
///
/// Identities are produced outside this crate; predicates only read them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier. `None` for an anonymous caller.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: Some(subject.into()),
            role,
        }
    }

    pub fn standard(subject: impl Into<String>) -> Self {
        Self::new(subject, Role::Standard)
    }

    pub fn elevated(subject: impl Into<String>) -> Self {
        Self::new(subject, Role::Elevated)
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read one identity field as a value for comparison.
    pub fn field(&self, field: IdentityField) -> Value {
        match field {
            IdentityField::Subject => self.subject.clone().into(),
            IdentityField::Role => self.role.as_str().into(),
        }
    }
}

/// Identity fields that predicates may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    Subject,
    Role,
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityField::Subject => f.write_str("subject"),
            IdentityField::Role => f.write_str("role"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_fields() {
        let id = Identity::elevated("u1");
        assert_eq!(id.field(IdentityField::Subject), Value::from("u1"));
        assert_eq!(id.field(IdentityField::Role), Value::from("elevated"));
        assert!(Identity::anonymous().field(IdentityField::Subject).is_null());
    }

    #[test]
    fn test_identity_from_json() {
        let id: Identity = serde_json::from_str(r#"{"subject":"u2","role":"standard"}"#).unwrap();
        assert_eq!(id, Identity::standard("u2"));

        let anon: Identity = serde_json::from_str("{}").unwrap();
        assert_eq!(anon, Identity::anonymous());
    }
}
