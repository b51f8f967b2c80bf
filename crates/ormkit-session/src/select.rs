//! Typed read builder returned by [`Session::from`].

use std::marker::PhantomData;

use ormkit_core::{Entity, EntityRef, Filter, Order, Provider, Result};

use crate::session::Session;

/// A pending read over one entity class.
///
/// Conditions accumulate on the builder; nothing touches the database
/// until [`Select::all`] or [`Select::first`] runs. Rows come back as
/// shared handles reconciled through the session's identity cache, with
/// declared relations loaded one level deep.
#[must_use = "a select does nothing until `all` or `first` runs"]
pub struct Select<'s, P: Provider, T: Entity> {
    session: &'s mut Session<P>,
    filter: Option<Filter>,
    order: Vec<(String, Order)>,
    limit: Option<u64>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, P: Provider, T: Entity> Select<'s, P, T> {
    pub(crate) fn new(session: &'s mut Session<P>) -> Self {
        Self {
            session,
            filter: None,
            order: Vec::new(),
            limit: None,
            _entity: PhantomData,
        }
    }

    /// Narrow the read; repeated calls combine with AND.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Order the result by a property. Repeated calls append sort keys.
    pub fn order_by(mut self, property: impl Into<String>, order: Order) -> Self {
        self.order.push((property.into(), order));
        self
    }

    /// Cap the number of returned instances.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the read and return every matching instance.
    pub fn all(self) -> Result<Vec<EntityRef<T>>> {
        self.session.find_all(self.filter, self.order, self.limit)
    }

    /// Run the read and return the first matching instance, if any.
    pub fn first(self) -> Result<Option<EntityRef<T>>> {
        let found = self.session.find_all(self.filter, self.order, Some(1))?;
        Ok(found.into_iter().next())
    }
}
