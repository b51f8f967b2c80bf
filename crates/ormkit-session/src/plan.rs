//! Merge planning.
//!
//! A merge call names root instances; the plan works out everything else
//! before the first statement runs: the transitive closure over declared
//! references, batch-scoped cross-reference validation, and a stable
//! topological order that writes required parents before their dependents.

use std::any::TypeId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use ormkit_core::{AnyEntity, Error, MetadataCache, RelationKind, Result};

/// How a merge decides between inserting and updating an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMode {
    /// Insert; fails when the instance is already tracked.
    Create,
    /// Update keyed by objectId.
    Update,
    /// Insert untracked instances, update tracked ones.
    #[default]
    Auto,
}

/// One instance scheduled for writing, with the mode it will use.
#[derive(Debug, Clone)]
pub struct MergeItem {
    pub entity: AnyEntity,
    pub mode: MergeMode,
}

pub(crate) fn instance_id(entity: &AnyEntity) -> (TypeId, usize) {
    (entity.entity_type(), entity.instance_key())
}

/// Close a batch over every instance the roots reach through declared
/// relations.
///
/// Roots keep the caller's mode; discovered instances merge with Auto.
/// De-duplication is by reference identity, first occurrence wins, so a
/// root listed twice or discovered again keeps its first assignment.
#[must_use]
pub fn expand_batch(roots: &[AnyEntity], mode: MergeMode) -> Vec<MergeItem> {
    let mut seen: HashSet<(TypeId, usize)> = HashSet::new();
    let mut items: Vec<MergeItem> = Vec::new();
    let mut queue: VecDeque<MergeItem> = roots
        .iter()
        .map(|root| MergeItem {
            entity: root.clone(),
            mode,
        })
        .collect();

    while let Some(item) = queue.pop_front() {
        if !seen.insert(instance_id(&item.entity)) {
            continue;
        }
        for (_, target) in item.entity.referenced() {
            if let Some(target) = target {
                queue.push_back(MergeItem {
                    entity: target,
                    mode: MergeMode::Auto,
                });
            }
        }
        for relation in item.entity.descriptor().relations {
            if relation.kind != RelationKind::OneToMany {
                continue;
            }
            for member in item.entity.collected(relation.name) {
                queue.push_back(MergeItem {
                    entity: member,
                    mode: MergeMode::Auto,
                });
            }
        }
        items.push(item);
    }
    items
}

/// A consistency failure found during validation, keyed by the violating
/// instance.
pub struct Violation {
    pub entity: AnyEntity,
    pub error: Error,
}

/// Check declared bidirectional relations across a batch.
///
/// For every instance whose collection lists a member also present in the
/// batch, the member's declared back pointer must be unset or point back
/// at the collecting instance. Detection is one-sided: only the collecting
/// side exposes both ends to compare, so a stale back pointer whose owner
/// is absent from the batch goes unnoticed.
pub fn validate_cross_references(
    cache: &MetadataCache,
    items: &[MergeItem],
) -> Result<Vec<Violation>> {
    let members: HashSet<(TypeId, usize)> =
        items.iter().map(|item| instance_id(&item.entity)).collect();
    let mut flagged: HashSet<(TypeId, usize)> = HashSet::new();
    let mut violations = Vec::new();

    for item in items {
        let owner = &item.entity;
        let meta = cache.resolve(owner.descriptor())?;
        for relation in meta.one_to_many() {
            let Some(reciprocal) = relation.reciprocal else {
                continue;
            };
            for member in owner.collected(relation.name()) {
                if !members.contains(&instance_id(&member)) {
                    continue;
                }
                let back = member
                    .referenced()
                    .into_iter()
                    .find(|(name, _)| *name == reciprocal)
                    .and_then(|(_, target)| target);
                let Some(back) = back else {
                    continue;
                };
                if back.same_instance(owner) || !flagged.insert(instance_id(&member)) {
                    continue;
                }
                violations.push(Violation {
                    error: Error::entity(
                        member.entity_name(),
                        format!(
                            "back reference '{reciprocal}' points at a different '{}' \
                             than the instance collecting it through '{}'",
                            owner.entity_name(),
                            relation.name()
                        ),
                    ),
                    entity: member,
                });
            }
        }
    }
    Ok(violations)
}

/// Order items so required parents are written before their dependents.
///
/// An item depends on another when it declares a required many-to-one
/// relation to it and that target has no objectId yet; targets with a
/// known id need no ordering, and targets outside the batch are not this
/// batch's concern. The sort is stable: unordered items keep their input
/// positions. A cycle among required dependencies cannot be satisfied and
/// fails the whole batch.
pub fn order_by_dependencies(items: Vec<MergeItem>) -> Result<Vec<MergeItem>> {
    let index_of: HashMap<(TypeId, usize), usize> = items
        .iter()
        .enumerate()
        .map(|(index, item)| (instance_id(&item.entity), index))
        .collect();

    let mut depends_on: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut indegree = vec![0_usize; items.len()];
    for (index, item) in items.iter().enumerate() {
        for (name, target) in item.entity.referenced() {
            let Some(target) = target else { continue };
            let required = item
                .entity
                .descriptor()
                .relation(name)
                .is_some_and(|def| def.required);
            if !required || target.object_id().is_some() {
                continue;
            }
            let Some(&parent) = index_of.get(&instance_id(&target)) else {
                continue;
            };
            depends_on[index].push(parent);
            dependents[parent].push(index);
            indegree[index] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();
    let mut order = Vec::with_capacity(items.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != items.len() {
        let unresolved: HashSet<usize> = (0..items.len())
            .filter(|index| !order.contains(index))
            .collect();
        let cycle = find_cycle(&depends_on, &unresolved);
        let path = cycle
            .iter()
            .map(|&index| items[index].entity.entity_name())
            .collect::<Vec<_>>()
            .join(" -> ");
        let first = cycle
            .first()
            .map_or("unknown", |&index| items[index].entity.entity_name());
        return Err(Error::entity(
            first,
            format!("unresolvable reference cycle: {path}"),
        ));
    }

    let mut rank = vec![0_usize; items.len()];
    for (position, &index) in order.iter().enumerate() {
        rank[index] = position;
    }
    let mut keyed: Vec<(usize, MergeItem)> = rank.into_iter().zip(items).collect();
    keyed.sort_by_key(|(position, _)| *position);
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}

fn find_cycle(depends_on: &[Vec<usize>], unresolved: &HashSet<usize>) -> Vec<usize> {
    let mut visited = HashSet::new();
    let mut starts: Vec<usize> = unresolved.iter().copied().collect();
    starts.sort_unstable();
    for start in starts {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        if let Some(cycle) = walk(
            start,
            depends_on,
            unresolved,
            &mut visited,
            &mut path,
            &mut on_path,
        ) {
            return cycle;
        }
    }
    Vec::new()
}

fn walk(
    node: usize,
    depends_on: &[Vec<usize>],
    unresolved: &HashSet<usize>,
    visited: &mut HashSet<usize>,
    path: &mut Vec<usize>,
    on_path: &mut HashSet<usize>,
) -> Option<Vec<usize>> {
    if on_path.contains(&node) {
        let start = path.iter().position(|&seen| seen == node).unwrap_or(0);
        let mut cycle = path[start..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if !visited.insert(node) {
        return None;
    }
    on_path.insert(node);
    path.push(node);
    for &next in &depends_on[node] {
        if unresolved.contains(&next) {
            if let Some(cycle) = walk(next, depends_on, unresolved, visited, path, on_path) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    on_path.remove(&node);
    None
}
