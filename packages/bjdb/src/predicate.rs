//! Record predicates.
//!
//! Exact-match building blocks (term, prefix, exists) plus boolean
//! combinators. There is no relevance model: every matching leaf clause
//! contributes a constant score of 1.0 and combinators sum their matching
//! clauses. That is enough to make score modes meaningful without pulling
//! in text analysis.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Score contributed by one matching leaf clause.
pub const CLAUSE_SCORE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every record (score 1.0).
    MatchAll,
    /// Matches nothing.
    MatchNone,
    /// `field` has exactly `value` among its values.
    Term { field: String, value: String },
    /// `field` has a value starting with `prefix`.
    Prefix { field: String, prefix: String },
    /// `field` is present.
    Exists { field: String },
    /// All clauses must match. An empty list matches everything with score 0.
    And(Vec<Predicate>),
    /// At least one clause must match. An empty list matches nothing.
    Or(Vec<Predicate>),
    /// Inner predicate must not match. Contributes score 0.
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Predicate::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Predicate::Exists { field: field.into() }
    }

    pub fn all_of(clauses: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(clauses.into_iter().collect())
    }

    pub fn any_of(clauses: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(clauses.into_iter().collect())
    }

    pub fn negate(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// Conjunction of `field = value` terms, the common query shape.
    pub fn terms<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Predicate::all_of(pairs.into_iter().map(|(f, v)| Predicate::term(f, v)))
    }

    /// Score of `record` under this predicate, `None` when it doesn't match.
    pub fn score(&self, record: &Record) -> Option<f32> {
        match self {
            Predicate::MatchAll => Some(CLAUSE_SCORE),
            Predicate::MatchNone => None,
            Predicate::Term { field, value } => {
                record.has_value(field, value).then_some(CLAUSE_SCORE)
            }
            Predicate::Prefix { field, prefix } => record
                .values(field)
                .iter()
                .any(|v| v.starts_with(prefix.as_str()))
                .then_some(CLAUSE_SCORE),
            Predicate::Exists { field } => record.has_field(field).then_some(CLAUSE_SCORE),
            Predicate::And(clauses) => {
                let mut total = 0.0;
                for clause in clauses {
                    total += clause.score(record)?;
                }
                Some(total)
            }
            Predicate::Or(clauses) => {
                let mut matched = false;
                let mut total = 0.0;
                for score in clauses.iter().filter_map(|c| c.score(record)) {
                    matched = true;
                    total += score;
                }
                matched.then_some(total)
            }
            Predicate::Not(inner) => match inner.score(record) {
                Some(_) => None,
                None => Some(0.0),
            },
        }
    }

    #[inline]
    pub fn matches(&self, record: &Record) -> bool {
        self.score(record).is_some()
    }

    /// True when evaluation only looks up field values (no negation and no
    /// match-all), so it tends to be selective. Used to pick evaluation order.
    pub fn is_selective(&self) -> bool {
        match self {
            Predicate::Term { .. } | Predicate::Prefix { .. } | Predicate::Exists { .. } => true,
            Predicate::MatchNone => true,
            Predicate::And(clauses) => clauses.iter().any(Predicate::is_selective),
            Predicate::Or(clauses) => {
                !clauses.is_empty() && clauses.iter().all(Predicate::is_selective)
            }
            Predicate::MatchAll | Predicate::Not(_) => false,
        }
    }
}
