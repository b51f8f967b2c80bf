//! The session: a unit-of-work front over one provider connection.
//!
//! All persistence flows through [`Session`]. Merges cascade over the
//! object graph, reads reconcile rows against the identity cache so one
//! database row maps to one shared instance, and transaction scopes are
//! declared rather than managed by hand. A session is single-threaded by
//! contract; share the [`MetadataCache`] across sessions instead.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ormkit_core::{
    AnyEntity, ConfigError, Entity, EntityMetadata, EntityRef, Error, Filter, MetadataCache,
    Operation, Order, Provider, Query, QueryBuilder, QueryResult, RelationMeta, Result, Row, Value,
};
use ormkit_sqlite::SqliteProvider;

use crate::config::SessionConfig;
use crate::identity::IdentityCache;
use crate::plan::{self, MergeMode};
use crate::select::Select;
use crate::transaction::{
    Disposition, Frame, FrameKind, Propagation, TransactionStack, TransactionToken, lock,
};

/// Orchestrates reads, merges, removals, and transaction scopes over a
/// provider.
///
/// The session connects lazily on first use and disconnects when dropped.
/// Failures are returned and also retained for [`Session::last_error`];
/// an error inside a declared transaction scope marks that scope
/// rollback-only.
#[derive(Debug)]
pub struct Session<P: Provider> {
    provider: Arc<Mutex<P>>,
    metadata: Arc<MetadataCache>,
    identity: IdentityCache,
    transaction: Arc<Mutex<TransactionStack>>,
    last_error: Option<Error>,
}

impl<P: Provider> Session<P> {
    /// Create a session with its own metadata cache.
    pub fn new(provider: P) -> Self {
        Self::with_metadata(provider, Arc::new(MetadataCache::new()))
    }

    /// Create a session over a shared metadata cache.
    ///
    /// Metadata derivation is pure, so any number of sessions can reuse
    /// one cache.
    pub fn with_metadata(provider: P, metadata: Arc<MetadataCache>) -> Self {
        Self {
            provider: Arc::new(Mutex::new(provider)),
            metadata,
            identity: IdentityCache::new(),
            transaction: Arc::new(Mutex::new(TransactionStack::default())),
            last_error: None,
        }
    }

    /// Shared metadata cache backing this session.
    #[must_use]
    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// The error recorded by the most recent failed operation, if any.
    ///
    /// Cleared at the start of every session operation, so `None` after a
    /// call means that call succeeded.
    #[must_use]
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Whether this session currently tracks the given instance.
    #[must_use]
    pub fn is_tracked<T: Entity>(&self, entity: &EntityRef<T>) -> bool {
        self.identity.is_tracked(&AnyEntity::new(entity))
    }

    /// Start a typed read over the entity class `T`.
    pub fn from<T: Entity>(&mut self) -> Select<'_, P, T> {
        Select::new(self)
    }

    /// Persist an instance and everything it references, inserting or
    /// updating each one as the identity cache dictates.
    pub fn merge<T: Entity>(&mut self, entity: &EntityRef<T>) -> Result<()> {
        self.merge_with_mode(entity, MergeMode::Auto)
    }

    /// Persist an instance and everything it references with an explicit
    /// mode for the instance itself.
    ///
    /// Instances discovered through relations always merge with
    /// [`MergeMode::Auto`].
    pub fn merge_with_mode<T: Entity>(
        &mut self,
        entity: &EntityRef<T>,
        mode: MergeMode,
    ) -> Result<()> {
        self.merge_batch(&[AnyEntity::new(entity)], mode)
    }

    /// Persist a batch of instances and their transitive references.
    ///
    /// The batch is expanded over declared relations, validated for
    /// cross-reference consistency, and written with required targets
    /// first. Instances that fail validation are skipped while the rest
    /// proceed; a statement failure stops the batch, leaving earlier
    /// writes in place. The first failure becomes the result and stays
    /// available through [`Session::last_error`].
    #[tracing::instrument(level = "debug", skip(self, roots), fields(roots = roots.len()))]
    pub fn merge_batch(&mut self, roots: &[AnyEntity], mode: MergeMode) -> Result<()> {
        self.last_error = None;
        self.ensure_connected()?;

        let items = plan::expand_batch(roots, mode);
        let violations = plan::validate_cross_references(&self.metadata, &items)
            .map_err(|error| self.record_error(error))?;
        let mut first_failure: Option<Error> = None;
        let mut skipped: HashSet<(TypeId, usize)> = HashSet::new();
        for violation in violations {
            tracing::debug!(
                entity = violation.entity.entity_name(),
                error = %violation.error,
                "skipping instance that failed cross-reference validation"
            );
            skipped.insert(plan::instance_id(&violation.entity));
            if first_failure.is_none() {
                first_failure = Some(violation.error);
            }
        }
        let runnable: Vec<_> = items
            .into_iter()
            .filter(|item| !skipped.contains(&plan::instance_id(&item.entity)))
            .collect();
        let ordered = match plan::order_by_dependencies(runnable) {
            Ok(ordered) => ordered,
            Err(error) => return Err(self.record_error(error)),
        };
        for item in &ordered {
            if let Err(error) = self.merge_one(&item.entity, item.mode) {
                if first_failure.is_none() {
                    first_failure = Some(error);
                }
                break;
            }
        }
        match first_failure {
            Some(error) => Err(self.record_error(error)),
            None => Ok(()),
        }
    }

    /// Delete one instance by its object ID.
    ///
    /// The statement must affect exactly one row; anything else reports
    /// the instance as out of sync. On success the instance leaves the
    /// identity cache.
    ///
    /// # Panics
    ///
    /// Panics when `T` declares no object ID property; a delete without a
    /// key column cannot be scoped to one instance.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn remove<T: Entity>(&mut self, entity: &EntityRef<T>) -> Result<()> {
        self.last_error = None;
        let erased = AnyEntity::new(entity);
        let meta = self
            .metadata
            .get::<T>()
            .map_err(|error| self.record_error(error))?;
        let Some(mapping) = meta.object_id() else {
            panic!(
                "entity class '{}' declares no object ID property; refusing to delete without one",
                meta.entity()
            );
        };
        let Some(id) = erased.object_id() else {
            let error = Error::entity(
                erased.entity_name(),
                "cannot delete an instance whose object ID is unset",
            );
            return Err(self.record_error(error));
        };
        self.ensure_connected()?;
        let query = QueryBuilder::from(Arc::clone(&meta))
            .filter(Filter::property(mapping.name).equal(id))
            .build(Operation::Delete);
        let result = self.run(&query)?;
        if result.rows_affected != 1 {
            let error = Error::entity(
                erased.entity_name(),
                format!(
                    "delete affected {} rows, expected exactly 1",
                    result.rows_affected
                ),
            );
            return Err(self.record_error(error));
        }
        self.identity.evict(&erased);
        tracing::debug!(entity = erased.entity_name(), id, "deleted");
        Ok(())
    }

    /// Run a prepared query as-is.
    ///
    /// Reads come back as type-erased handles reconciled through the
    /// identity cache, without relation loading. Writes return nothing.
    pub fn execute(&mut self, query: &Query) -> Result<Vec<AnyEntity>> {
        self.last_error = None;
        self.ensure_connected()?;
        let result = self.run(query)?;
        if query.operation() == Operation::Read {
            let (instances, _) = self.materialize(query.relation(), &result.rows)?;
            return Ok(instances);
        }
        Ok(Vec::new())
    }

    /// Declare a transaction scope and receive the token that ends it.
    ///
    /// With no transaction open, either propagation starts one. Nested,
    /// [`Propagation::Require`] joins the open transaction and
    /// [`Propagation::RequiresNew`] runs on a savepoint of its own.
    pub fn declare_transaction(
        &mut self,
        propagation: Propagation,
        disposition: Disposition,
    ) -> Result<TransactionToken<P>> {
        self.last_error = None;
        self.ensure_connected()?;
        let opened = {
            let mut stack = lock(&self.transaction);
            let mut provider = lock(&self.provider);
            let kind = if stack.depth() == 0 {
                provider.begin_transaction().map(|()| FrameKind::Root)
            } else {
                match propagation {
                    Propagation::Require => Ok(FrameKind::Joined),
                    Propagation::RequiresNew => {
                        let name = stack.next_savepoint();
                        provider
                            .savepoint(&name)
                            .map(|()| FrameKind::Savepoint(name))
                    }
                }
            };
            kind.map(|kind| {
                let frame = stack.depth();
                stack.frames.push(Frame {
                    kind,
                    disposition,
                    poisoned: false,
                });
                frame
            })
        };
        match opened {
            Ok(frame) => Ok(TransactionToken::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.transaction),
                frame,
            )),
            Err(error) => Err(self.record_error(error)),
        }
    }

    /// Record a failure: remember it for [`Session::last_error`] and mark
    /// the innermost transaction scope rollback-only.
    fn record_error(&mut self, error: Error) -> Error {
        lock(&self.transaction).poison_current();
        self.last_error = Some(error.clone());
        error
    }

    fn ensure_connected(&mut self) -> Result<()> {
        let outcome = {
            let mut provider = lock(&self.provider);
            if provider.is_connected() {
                Ok(())
            } else {
                provider.connect()
            }
        };
        outcome.map_err(|error| self.record_error(error))
    }

    fn run(&mut self, query: &Query) -> Result<QueryResult> {
        let outcome = {
            let mut provider = lock(&self.provider);
            provider.execute(query)
        };
        outcome.map_err(|error| self.record_error(error))
    }

    fn merge_one(&mut self, entity: &AnyEntity, mode: MergeMode) -> Result<()> {
        let meta = self
            .metadata
            .resolve(entity.descriptor())
            .map_err(|error| self.record_error(error))?;
        let tracked = self.identity.is_tracked(entity);
        let create = match mode {
            MergeMode::Create => {
                if tracked {
                    let error = Error::entity(
                        entity.entity_name(),
                        "unable to merge with MergeMode::Create: the instance is already \
                         tracked; use MergeMode::Auto or MergeMode::Update instead",
                    );
                    return Err(self.record_error(error));
                }
                true
            }
            MergeMode::Update => false,
            MergeMode::Auto => !tracked,
        };
        if create {
            self.create_instance(&meta, entity)
        } else {
            self.update_instance(&meta, entity)
        }
    }

    fn create_instance(&mut self, meta: &Arc<EntityMetadata>, entity: &AnyEntity) -> Result<()> {
        let record = write_record(meta, entity);
        let query = QueryBuilder::from(Arc::clone(meta))
            .record(record)
            .build(Operation::Create);
        let result = self.run(&query)?;
        let generated = meta
            .object_id()
            .filter(|mapping| mapping.auto_generated)
            .and(result.last_inserted_id);
        if let Some(id) = generated {
            entity.set_object_id(id);
        }
        self.identity.track(entity);
        tracing::debug!(
            entity = entity.entity_name(),
            id = ?entity.object_id(),
            "created"
        );
        Ok(())
    }

    fn update_instance(&mut self, meta: &Arc<EntityMetadata>, entity: &AnyEntity) -> Result<()> {
        if entity.object_id().is_none() {
            let error = Error::entity(
                entity.entity_name(),
                "cannot update an instance whose object ID is unset",
            );
            return Err(self.record_error(error));
        }
        let record = write_record(meta, entity);
        let query = QueryBuilder::from(Arc::clone(meta))
            .record(record)
            .build(Operation::Update);
        let result = self.run(&query)?;
        if result.rows_affected != 1 {
            let error = Error::entity(
                entity.entity_name(),
                format!(
                    "update affected {} rows, expected exactly 1",
                    result.rows_affected
                ),
            );
            return Err(self.record_error(error));
        }
        self.identity.track(entity);
        tracing::debug!(
            entity = entity.entity_name(),
            id = ?entity.object_id(),
            "updated"
        );
        Ok(())
    }

    pub(crate) fn find_all<T: Entity>(
        &mut self,
        filter: Option<Filter>,
        order: Vec<(String, Order)>,
        limit: Option<u64>,
    ) -> Result<Vec<EntityRef<T>>> {
        self.last_error = None;
        self.ensure_connected()?;
        let meta = self
            .metadata
            .get::<T>()
            .map_err(|error| self.record_error(error))?;
        let mut builder = QueryBuilder::from(Arc::clone(&meta));
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }
        for (property, direction) in order {
            builder = builder.order_by(property, direction);
        }
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        let query = builder.build(Operation::Read);
        let result = self.run(&query)?;
        let (instances, fresh) = self.materialize(&meta, &result.rows)?;
        self.load_relations(&meta, &instances, &result.rows, &fresh)?;
        let mut typed = Vec::with_capacity(instances.len());
        for instance in instances {
            let Some(handle) = instance.downcast::<T>() else {
                let error =
                    Error::entity(meta.entity(), "materialized instance has an unexpected class");
                return Err(self.record_error(error));
            };
            typed.push(handle);
        }
        Ok(typed)
    }

    /// Turn rows into instances, reconciling through the identity cache.
    ///
    /// A row whose object ID is already tracked yields the tracked handle
    /// unchanged; in-memory state wins over freshly read columns. New
    /// instances enter the cache and are reported in the freshness set so
    /// relation wiring leaves tracked object graphs alone.
    fn materialize(
        &mut self,
        meta: &Arc<EntityMetadata>,
        rows: &[Row],
    ) -> Result<(Vec<AnyEntity>, HashSet<(TypeId, usize)>)> {
        let mut instances = Vec::with_capacity(rows.len());
        let mut fresh = HashSet::new();
        for row in rows {
            let id = meta
                .object_id()
                .and_then(|mapping| row.get_by_name(mapping.column)?.as_i64());
            let tracked = id.and_then(|id| self.identity.lookup(meta.type_key(), id));
            if let Some(existing) = tracked {
                instances.push(existing);
                continue;
            }
            let instance = meta
                .make_instance(row)
                .map_err(|error| self.record_error(error))?;
            self.identity.track(&instance);
            fresh.insert(plan::instance_id(&instance));
            instances.push(instance);
        }
        Ok((instances, fresh))
    }

    fn load_relations(
        &mut self,
        meta: &Arc<EntityMetadata>,
        instances: &[AnyEntity],
        rows: &[Row],
        fresh: &HashSet<(TypeId, usize)>,
    ) -> Result<()> {
        if instances.is_empty() {
            return Ok(());
        }
        for relation in meta.many_to_one() {
            self.load_referenced(relation, instances, rows, fresh)?;
        }
        for relation in meta.one_to_many() {
            self.load_collected(relation, instances, fresh)?;
        }
        Ok(())
    }

    /// Fetch the targets behind a many-to-one relation and wire them into
    /// the freshly materialized owners, one level deep.
    fn load_referenced(
        &mut self,
        relation: &RelationMeta,
        instances: &[AnyEntity],
        rows: &[Row],
        fresh: &HashSet<(TypeId, usize)>,
    ) -> Result<()> {
        let ids = distinct_ids(
            rows.iter()
                .map(|row| row.get_by_name(&relation.column).and_then(Value::as_i64)),
        );
        if ids.is_empty() {
            return Ok(());
        }
        let target_meta = self
            .metadata
            .resolve(relation.target())
            .map_err(|error| self.record_error(error))?;
        let Some(target_id) = target_meta.object_id() else {
            // Deriving the owner's metadata already required one.
            return Ok(());
        };
        let filters = ids
            .iter()
            .map(|&id| Filter::property(target_id.name).equal(id))
            .collect();
        let Some(filter) = Filter::any(filters) else {
            return Ok(());
        };
        let query = QueryBuilder::from(Arc::clone(&target_meta))
            .filter(filter)
            .build(Operation::Read);
        let fetched = self.run(&query)?;
        let (targets, _) = self.materialize(&target_meta, &fetched.rows)?;
        let mut by_id: HashMap<i64, &AnyEntity> = HashMap::new();
        for target in &targets {
            if let Some(id) = target.object_id() {
                by_id.insert(id, target);
            }
        }
        for (instance, row) in instances.iter().zip(rows) {
            if !fresh.contains(&plan::instance_id(instance)) {
                continue;
            }
            let Some(id) = row.get_by_name(&relation.column).and_then(Value::as_i64) else {
                continue;
            };
            if let Some(target) = by_id.get(&id).copied() {
                instance.set_referenced(relation.name(), target);
            }
        }
        Ok(())
    }

    /// Fetch the members of a one-to-many relation for the freshly
    /// materialized owners and wire both directions.
    fn load_collected(
        &mut self,
        relation: &RelationMeta,
        instances: &[AnyEntity],
        fresh: &HashSet<(TypeId, usize)>,
    ) -> Result<()> {
        let Some(reciprocal) = relation.reciprocal else {
            // Without a back reference there is no foreign key to follow.
            return Ok(());
        };
        let parents: Vec<(i64, &AnyEntity)> = instances
            .iter()
            .filter(|instance| fresh.contains(&plan::instance_id(instance)))
            .filter_map(|instance| instance.object_id().map(|id| (id, instance)))
            .collect();
        if parents.is_empty() {
            return Ok(());
        }
        let ids = distinct_ids(parents.iter().map(|&(id, _)| Some(id)));
        let target_meta = self
            .metadata
            .resolve(relation.target())
            .map_err(|error| self.record_error(error))?;
        let filters = ids
            .iter()
            .map(|&id| Filter::property(reciprocal).equal(id))
            .collect();
        let Some(filter) = Filter::any(filters) else {
            return Ok(());
        };
        let query = QueryBuilder::from(Arc::clone(&target_meta))
            .filter(filter)
            .build(Operation::Read);
        let fetched = self.run(&query)?;
        let (members, member_fresh) = self.materialize(&target_meta, &fetched.rows)?;
        let parents_by_id: HashMap<i64, &AnyEntity> = parents.iter().copied().collect();
        for (member, row) in members.iter().zip(&fetched.rows) {
            let Some(parent_id) = row.get_by_name(&relation.column).and_then(Value::as_i64) else {
                continue;
            };
            let Some(parent) = parents_by_id.get(&parent_id).copied() else {
                continue;
            };
            let listed = parent
                .collected(relation.name())
                .iter()
                .any(|existing| existing.same_instance(member));
            if !listed {
                parent.push_collected(relation.name(), member);
            }
            if member_fresh.contains(&plan::instance_id(member)) {
                member.set_referenced(reciprocal, parent);
            }
        }
        Ok(())
    }
}

impl Session<SqliteProvider> {
    /// Build a session from a parsed configuration.
    ///
    /// The top-level `verbose` flag turns on statement logging in the
    /// provider as well.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        if config.provider != "sqlite" {
            return Err(Error::from(ConfigError {
                message: format!("unsupported provider '{}'", config.provider),
            }));
        }
        let mut sqlite = config.sqlite.clone();
        sqlite.verbose = sqlite.verbose || config.verbose;
        Ok(Self::new(SqliteProvider::new(sqlite)))
    }

    /// Read a configuration file and build a session from it.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = SessionConfig::from_file(path)?;
        Self::from_config(&config)
    }
}

impl<P: Provider> Drop for Session<P> {
    fn drop(&mut self) {
        let mut provider = lock(&self.provider);
        if !provider.is_connected() {
            return;
        }
        if let Err(error) = provider.disconnect() {
            tracing::warn!(%error, "session drop failed to disconnect the provider");
        }
    }
}

/// Flatten an instance into the column record a write statement needs.
///
/// Simple properties come from the instance in declaration order; a
/// foreign-key entry per many-to-one relation carries the referenced
/// instance's object ID, or NULL when nothing is referenced.
fn write_record(meta: &EntityMetadata, entity: &AnyEntity) -> Vec<(String, Value)> {
    let mut record: Vec<(String, Value)> = entity
        .record()
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    for relation in meta.many_to_one() {
        let target = entity
            .referenced()
            .into_iter()
            .find(|(name, _)| *name == relation.name())
            .and_then(|(_, target)| target);
        let value = target
            .and_then(|target| target.object_id())
            .map_or(Value::Null, Value::BigInt);
        record.push((relation.name().to_string(), value));
    }
    record
}

fn distinct_ids(ids: impl Iterator<Item = Option<i64>>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.flatten().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Memo, Province, RecordingProvider, Town};
    use ormkit_core::ErrorKind;

    fn calls_of(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    #[test]
    fn test_write_record_derives_foreign_key_values() {
        let metadata = MetadataCache::new();
        let meta = metadata.get::<Town>().expect("metadata");
        let province = Province::create("Ostrobothnia");
        province.write().unwrap().id = Some(42);
        let town = Town::create("Oulu", 210_000);
        town.write().unwrap().province = Some(province);

        let record = write_record(&meta, &AnyEntity::new(&town));
        let names: Vec<&str> = record.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "population", "province"]);
        assert_eq!(record[3].1, Value::BigInt(42));
    }

    #[test]
    fn test_write_record_uses_null_for_unset_references() {
        let metadata = MetadataCache::new();
        let meta = metadata.get::<Town>().expect("metadata");
        let town = Town::create("Oulu", 210_000);

        let record = write_record(&meta, &AnyEntity::new(&town));
        assert_eq!(record[3], ("province".to_string(), Value::Null));
    }

    #[test]
    fn test_merge_create_assigns_the_generated_id() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);

        session.merge(&town).expect("merge");
        assert_eq!(town.read().unwrap().id, Some(1));
        assert!(session.is_tracked(&town));
        assert!(session.last_error().is_none());
        assert_eq!(calls_of(&calls), vec!["execute Create"]);
    }

    #[test]
    fn test_merge_cascades_to_the_referenced_parent() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let province = Province::create("Ostrobothnia");
        let town = Town::create("Oulu", 210_000);
        town.write().unwrap().province = Some(province.clone());

        session.merge(&town).expect("merge");
        // The required target is written first so its id can fill the
        // foreign key.
        assert_eq!(calls_of(&calls), vec!["execute Create", "execute Create"]);
        assert_eq!(province.read().unwrap().id, Some(1));
        assert_eq!(town.read().unwrap().id, Some(1));
        assert!(session.is_tracked(&province));
    }

    #[test]
    fn test_merge_create_rejects_a_tracked_instance() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);
        session.merge(&town).expect("first merge");

        let err = session
            .merge_with_mode(&town, MergeMode::Create)
            .expect_err("second create must fail");
        assert_eq!(err.kind(), ErrorKind::UnsynchronizedEntity);
        assert_eq!(session.last_error(), Some(&err));
        assert_eq!(calls_of(&calls), vec!["execute Create"]);
    }

    #[test]
    fn test_auto_updates_a_tracked_instance() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);

        session.merge(&town).expect("create");
        town.write().unwrap().population = 212_000;
        session.merge(&town).expect("update");
        assert_eq!(calls_of(&calls), vec!["execute Create", "execute Update"]);
    }

    #[test]
    fn test_update_requires_exactly_one_affected_row() {
        let (mut provider, _calls) = RecordingProvider::new();
        provider.rows_affected = 0;
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);
        town.write().unwrap().id = Some(7);

        let err = session
            .merge_with_mode(&town, MergeMode::Update)
            .expect_err("update of a missing row must fail");
        assert_eq!(err.kind(), ErrorKind::UnsynchronizedEntity);
        assert!(err.to_string().contains("expected exactly 1"));
    }

    #[test]
    fn test_update_requires_a_set_object_id() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);

        let err = session
            .merge_with_mode(&town, MergeMode::Update)
            .expect_err("update without an id must fail");
        assert_eq!(err.kind(), ErrorKind::UnsynchronizedEntity);
        assert!(calls_of(&calls).is_empty());
    }

    #[test]
    fn test_inconsistent_member_is_skipped_but_the_batch_continues() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let province = Province::create("Ostrobothnia");
        let other = Province::create("Lapland");
        let loyal = Town::create("Oulu", 210_000);
        let stray = Town::create("Kemi", 20_000);
        loyal.write().unwrap().province = Some(province.clone());
        stray.write().unwrap().province = Some(other.clone());
        province.write().unwrap().towns = vec![loyal.clone(), stray.clone()];

        let err = session.merge(&province).expect_err("stray town must fail");
        assert_eq!(err.kind(), ErrorKind::UnsynchronizedEntity);
        // Everything except the inconsistent member was written.
        assert_eq!(calls_of(&calls).len(), 3);
        assert_eq!(stray.read().unwrap().id, None);
        assert_eq!(loyal.read().unwrap().id, Some(1));
        assert_eq!(session.last_error(), Some(&err));
    }

    #[test]
    fn test_execution_failure_stops_the_batch() {
        let (mut provider, calls) = RecordingProvider::new();
        provider.fail_execute = true;
        let mut session = Session::new(provider);
        let province = Province::create("Ostrobothnia");
        let town = Town::create("Oulu", 210_000);
        town.write().unwrap().province = Some(province.clone());

        let err = session.merge(&town).expect_err("execution must fail");
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(calls_of(&calls).is_empty());
        assert_eq!(town.read().unwrap().id, None);
        assert_eq!(province.read().unwrap().id, None);
    }

    #[test]
    fn test_last_error_clears_on_the_next_successful_operation() {
        let (provider, _calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);
        session.merge(&town).expect("create");
        session
            .merge_with_mode(&town, MergeMode::Create)
            .expect_err("duplicate create must fail");
        assert!(session.last_error().is_some());

        let fresh = Town::create("Kempele", 18_500);
        session.merge(&fresh).expect("merge");
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_remove_requires_a_set_object_id() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);

        let err = session.remove(&town).expect_err("remove must fail");
        assert_eq!(err.kind(), ErrorKind::UnsynchronizedEntity);
        assert!(calls_of(&calls).is_empty());
    }

    #[test]
    fn test_remove_evicts_the_instance() {
        let (provider, calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let town = Town::create("Oulu", 210_000);
        session.merge(&town).expect("create");

        session.remove(&town).expect("remove");
        assert!(!session.is_tracked(&town));
        assert_eq!(calls_of(&calls), vec!["execute Create", "execute Delete"]);
    }

    #[test]
    #[should_panic(expected = "declares no object ID property")]
    fn test_remove_panics_without_an_object_id_property() {
        let (provider, _calls) = RecordingProvider::new();
        let mut session = Session::new(provider);
        let memo = Memo::create("pick up the keys");
        let _ = session.remove(&memo);
    }

    #[test]
    fn test_from_config_rejects_an_unknown_provider() {
        let config = SessionConfig {
            provider: "postgres".to_string(),
            ..SessionConfig::default()
        };
        let err = Session::from_config(&config).expect_err("must fail");
        assert!(err.to_string().contains("unsupported provider 'postgres'"));
    }
}
