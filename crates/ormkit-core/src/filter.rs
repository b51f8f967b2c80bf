//! Filter conditions for queries.
//!
//! A [`Filter`] is a tree of property comparisons combined with AND, OR,
//! and NOT. Trees are built against property names; the statement layer
//! resolves names to columns when it lowers the tree to SQL.
//!
//! ```
//! use ormkit_core::{Filter, Value};
//!
//! let filter = Filter::property("population")
//!     .greater(Value::Int(100_000))
//!     .and(Filter::property("name").like(Value::from("San%")));
//! ```

use crate::value::Value;

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Like,
}

/// A condition tree over entity properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `property <op> value`.
    Comparison {
        property: String,
        op: Comparison,
        value: Value,
    },
    /// Every branch must hold.
    And(Vec<Filter>),
    /// At least one branch must hold.
    Or(Vec<Filter>),
    /// The inner condition must not hold.
    Not(Box<Filter>),
}

impl Filter {
    /// Start a condition on a property or many-to-one relation name.
    pub fn property(name: impl Into<String>) -> FilterProperty {
        FilterProperty { name: name.into() }
    }

    /// Combine with another condition; both must hold. Adjacent AND
    /// nodes are flattened.
    #[must_use]
    pub fn and(self, other: Filter) -> Filter {
        match self {
            Filter::And(mut branches) => {
                branches.push(other);
                Filter::And(branches)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Combine with another condition; either may hold. Adjacent OR
    /// nodes are flattened.
    #[must_use]
    pub fn or(self, other: Filter) -> Filter {
        match self {
            Filter::Or(mut branches) => {
                branches.push(other);
                Filter::Or(branches)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// Negate this condition.
    #[must_use]
    pub fn negate(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    /// Join conditions so that all of them must hold. Returns `None`
    /// for an empty list.
    #[must_use]
    pub fn all(conditions: Vec<Filter>) -> Option<Filter> {
        let mut it = conditions.into_iter();
        let first = it.next()?;
        Some(it.fold(first, Filter::and))
    }

    /// Join conditions so that any of them may hold. Returns `None`
    /// for an empty list.
    #[must_use]
    pub fn any(conditions: Vec<Filter>) -> Option<Filter> {
        let mut it = conditions.into_iter();
        let first = it.next()?;
        Some(it.fold(first, Filter::or))
    }
}

/// Builder handle naming the property of a pending comparison.
#[derive(Debug, Clone)]
pub struct FilterProperty {
    name: String,
}

impl FilterProperty {
    fn compare(self, op: Comparison, value: impl Into<Value>) -> Filter {
        Filter::Comparison {
            property: self.name,
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn equal(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::Equal, value)
    }

    #[must_use]
    pub fn not_equal(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::NotEqual, value)
    }

    #[must_use]
    pub fn less(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::Less, value)
    }

    #[must_use]
    pub fn greater(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::Greater, value)
    }

    #[must_use]
    pub fn less_or_equal(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::LessOrEqual, value)
    }

    #[must_use]
    pub fn greater_or_equal(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::GreaterOrEqual, value)
    }

    /// SQL `LIKE` pattern match.
    #[must_use]
    pub fn like(self, value: impl Into<Value>) -> Filter {
        self.compare(Comparison::Like, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_structure() {
        let filter = Filter::property("name").equal("Oulu");
        assert_eq!(
            filter,
            Filter::Comparison {
                property: "name".to_string(),
                op: Comparison::Equal,
                value: Value::Text("Oulu".to_string()),
            }
        );
    }

    #[test]
    fn test_and_flattens() {
        let filter = Filter::property("a")
            .equal(1)
            .and(Filter::property("b").equal(2))
            .and(Filter::property("c").equal(3));
        match filter {
            Filter::And(branches) => assert_eq!(branches.len(), 3),
            other => panic!("expected a flattened AND, got {other:?}"),
        }
    }

    #[test]
    fn test_negation_wraps() {
        let filter = Filter::property("done").equal(true).negate();
        assert!(matches!(filter, Filter::Not(_)));
    }

    #[test]
    fn test_any_over_ids() {
        let branches = (1..=3)
            .map(|id| Filter::property("id").equal(i64::from(id)))
            .collect();
        let filter = Filter::any(branches).unwrap();
        match filter {
            Filter::Or(branches) => assert_eq!(branches.len(), 3),
            other => panic!("expected a flattened OR, got {other:?}"),
        }
        assert_eq!(Filter::any(Vec::new()), None);
    }
}
