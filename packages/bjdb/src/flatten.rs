//! Flattened document model, kept for comparison with the block join.
//!
//! Flattening copies the parent's fields and appends every child value under
//! `<prefix>.<field>`. Which values came from the same child is lost, so a
//! conjunction over child fields can be satisfied by two different children.

use crate::predicate::Predicate;
use crate::record::Record;

pub const DEFAULT_CHILD_PREFIX: &str = "child";

/// Collapse a block into a single record.
pub fn flatten_block(children: &[Record], parent: &Record, prefix: &str) -> Record {
    let mut flat = parent.clone();
    for child in children {
        for (field, values) in child.fields() {
            let name = format!("{}.{}", prefix, field);
            for value in values {
                flat.add(name.clone(), value.clone());
            }
        }
    }
    flat
}

/// Rewrite a child-level predicate to address the prefixed fields of a
/// flattened record.
pub fn prefix_predicate(predicate: &Predicate, prefix: &str) -> Predicate {
    let field = |f: &str| format!("{}.{}", prefix, f);
    match predicate {
        Predicate::MatchAll => Predicate::MatchAll,
        Predicate::MatchNone => Predicate::MatchNone,
        Predicate::Term { field: f, value } => Predicate::term(field(f), value.clone()),
        Predicate::Prefix { field: f, prefix: p } => Predicate::prefix(field(f), p.clone()),
        Predicate::Exists { field: f } => Predicate::exists(field(f)),
        Predicate::And(clauses) => {
            Predicate::all_of(clauses.iter().map(|c| prefix_predicate(c, prefix)))
        }
        Predicate::Or(clauses) => {
            Predicate::any_of(clauses.iter().map(|c| prefix_predicate(c, prefix)))
        }
        Predicate::Not(inner) => Predicate::negate(prefix_predicate(inner, prefix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(color: &str, size: &str) -> Record {
        Record::new().with("color", color).with("size", size)
    }

    #[test]
    fn test_flatten_keeps_parent_and_prefixes_children() {
        let parent = Record::new().with("docType", "parent").with("name", "dog");
        let flat = flatten_block(
            &[variant("blue", "small"), variant("red", "medium")],
            &parent,
            DEFAULT_CHILD_PREFIX,
        );
        assert_eq!(flat.get("name"), Some("dog"));
        assert_eq!(flat.values("child.color"), ["blue", "red"]);
        assert_eq!(flat.values("child.size"), ["small", "medium"]);
    }

    #[test]
    fn test_flattened_conjunction_crosses_children() {
        let child = Predicate::terms([("color", "blue"), ("size", "medium")]);
        let flat_query = prefix_predicate(&child, DEFAULT_CHILD_PREFIX);

        let wolf = flatten_block(
            &[variant("blue", "small"), variant("green", "medium"), variant("yellow", "large")],
            &Record::new().with("name", "wolf"),
            DEFAULT_CHILD_PREFIX,
        );
        let dog = flatten_block(
            &[variant("blue", "small"), variant("red", "medium")],
            &Record::new().with("name", "dog"),
            DEFAULT_CHILD_PREFIX,
        );
        // no single child is blue and medium, yet both flattened records match
        assert!(flat_query.matches(&wolf));
        assert!(flat_query.matches(&dog));
    }

    #[test]
    fn test_prefix_predicate_nested() {
        let p = Predicate::negate(Predicate::any_of([Predicate::exists("sku")]));
        assert_eq!(
            prefix_predicate(&p, "v"),
            Predicate::negate(Predicate::any_of([Predicate::exists("v.sku")]))
        );
    }
}
