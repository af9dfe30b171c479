//! Social graph: "Who's in your life"
//!
//! People the user talks about, deduplicated by name or alias, and the
//! relationships between them, deduplicated by unordered pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PersonId;

/// Someone the user has mentioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,
    /// Primary name.
    pub name: String,
    /// Other names the same person goes by.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Relation to the user ("sister", "coworker"…).
    #[serde(default)]
    pub relation: Option<String>,
    /// Times mentioned.
    #[serde(default)]
    pub mentions: u32,
    /// First mentioned.
    pub created_at: DateTime<Utc>,
    /// Last mentioned.
    pub updated_at: DateTime<Utc>,
}

impl Person {
    /// Create a person from a first mention.
    #[must_use]
    pub fn new(name: impl Into<String>, relation: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PersonId::new(),
            name: name.into(),
            aliases: Vec::new(),
            relation,
            mentions: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `name` matches this person's name or any alias
    /// (case-insensitive).
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    /// Merge aliases, skipping ones already known.
    pub fn add_aliases<'a>(&mut self, aliases: impl IntoIterator<Item = &'a str>) {
        for alias in aliases {
            let alias = alias.trim();
            if !alias.is_empty() && !self.answers_to(alias) {
                self.aliases.push(alias.to_string());
            }
        }
    }
}

/// A relationship between two people, independent of direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// One endpoint.
    pub a: PersonId,
    /// The other endpoint.
    pub b: PersonId,
    /// Relationship label ("married", "siblings"…).
    pub label: String,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl RelationshipEdge {
    /// Create an edge with endpoints stored in canonical order.
    #[must_use]
    pub fn new(x: PersonId, y: PersonId, label: impl Into<String>, now: DateTime<Utc>) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a,
            b,
            label: label.into(),
            updated_at: now,
        }
    }

    /// Whether this edge connects `x` and `y`, in either order.
    #[must_use]
    pub fn connects(&self, x: PersonId, y: PersonId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_match_case_insensitively() {
        let mut person = Person::new("Katherine", Some("sister".into()), Utc::now());
        person.add_aliases(["Kat", "kat", " "]);
        assert_eq!(person.aliases, vec!["Kat".to_string()]);
        assert!(person.answers_to("KAT"));
        assert!(person.answers_to("katherine"));
        assert!(!person.answers_to("Kate"));
    }

    #[test]
    fn edges_are_unordered() {
        let (x, y) = (PersonId::new(), PersonId::new());
        let edge = RelationshipEdge::new(x, y, "friends", Utc::now());
        assert!(edge.connects(y, x));
        assert!(edge.a <= edge.b);
    }
}
