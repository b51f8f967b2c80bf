//! The query model: one value describing one storage operation.
//!
//! A [`Query`] is assembled through [`QueryBuilder`] and immutable from
//! then on, so a provider can inspect it freely and statement generation
//! stays deterministic for a given query.

use std::sync::Arc;

use crate::filter::Filter;
use crate::metadata::EntityMetadata;
use crate::value::Value;

/// The kind of storage operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// Sort direction of one ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// An immutable description of one operation against one relation.
#[derive(Debug, Clone)]
pub struct Query {
    operation: Operation,
    relation: Arc<EntityMetadata>,
    projection: Arc<EntityMetadata>,
    filter: Option<Filter>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    record: Option<Vec<(String, Value)>>,
}

impl Query {
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The relation the operation targets.
    #[must_use]
    pub fn relation(&self) -> &Arc<EntityMetadata> {
        &self.relation
    }

    /// The entity class result rows materialize into.
    #[must_use]
    pub fn projection(&self) -> &Arc<EntityMetadata> {
        &self.projection
    }

    #[must_use]
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Ordering terms as `(property, direction)` pairs.
    #[must_use]
    pub fn order(&self) -> &[(String, Order)] {
        &self.order
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Property values written by `Create` and `Update` operations,
    /// declaration order.
    #[must_use]
    pub fn record(&self) -> Option<&[(String, Value)]> {
        self.record.as_deref()
    }
}

/// Assembles a [`Query`] step by step.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    relation: Arc<EntityMetadata>,
    projection: Option<Arc<EntityMetadata>>,
    filter: Option<Filter>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    record: Option<Vec<(String, Value)>>,
}

impl QueryBuilder {
    /// Start building a query against a relation. The projection
    /// defaults to the same class.
    #[must_use]
    pub fn from(relation: Arc<EntityMetadata>) -> Self {
        Self {
            relation,
            projection: None,
            filter: None,
            order: Vec::new(),
            limit: None,
            record: None,
        }
    }

    /// Add a condition. Conditions from repeated calls are combined
    /// with AND.
    #[must_use]
    pub fn filter(mut self, condition: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Materialize rows into a different class than the relation's.
    #[must_use]
    pub fn projection(mut self, projection: Arc<EntityMetadata>) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Append an ordering term.
    #[must_use]
    pub fn order_by(mut self, property: impl Into<String>, order: Order) -> Self {
        self.order.push((property.into(), order));
        self
    }

    /// Cap the number of returned rows.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attach the property values a write operation carries.
    #[must_use]
    pub fn record(mut self, record: Vec<(String, Value)>) -> Self {
        self.record = Some(record);
        self
    }

    /// Finish with the given operation.
    #[must_use]
    pub fn build(self, operation: Operation) -> Query {
        let projection = self.projection.unwrap_or_else(|| Arc::clone(&self.relation));
        Query {
            operation,
            relation: self.relation,
            projection,
            filter: self.filter,
            order: self.order,
            limit: self.limit,
            record: self.record,
        }
    }
}
