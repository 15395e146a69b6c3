//! Dependency-ordered planning
//!
//! Builds a dependency graph over the desired resources, orders it with a
//! deterministic topological sort, and diffs each resource against the
//! recorded state to decide whether it needs a create, an update, or
//! nothing at all. Planning is pure computation: no provider call, no
//! state mutation.

use groundwork_cloud::{Action, ObservedState, Operation, Plan};
use groundwork_core::{DesiredState, Result, SpecError};
use std::collections::{BTreeMap, BTreeSet};

/// Planning options
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Emit Delete actions for orphaned resources
    pub prune: bool,
}

/// Diff desired against observed state and produce an ordered plan.
///
/// Fails with [`SpecError::Cycle`] if the depends-on edges form a cycle
/// and with [`SpecError::UnknownDependency`]/[`SpecError::DuplicateId`]
/// for malformed graphs. Resources recorded as applied but absent from
/// `desired` are reported as orphaned; they produce Delete actions only
/// when `options.prune` is set, ordered dependents-first.
pub fn plan(
    desired: &DesiredState,
    observed: &ObservedState,
    options: PlanOptions,
) -> Result<Plan> {
    desired.validate()?;
    let order = topological_order(desired)?;

    let mut actions = Vec::with_capacity(order.len());
    for id in &order {
        let Some(spec) = desired.get(id) else {
            continue;
        };

        let operation = match observed.get(id) {
            Some(record) if record.exists => {
                if record.spec_hash.as_deref() == Some(spec.spec_hash().as_str()) {
                    Operation::Skip
                } else {
                    Operation::Update
                }
            }
            _ => Operation::Create,
        };

        actions.push(Action {
            resource_id: id.clone(),
            kind: spec.kind,
            operation,
            spec: Some(spec.clone()),
        });
    }

    let orphaned: Vec<String> = observed
        .existing()
        .filter(|(id, _)| desired.get(id).is_none())
        .map(|(id, _)| id.clone())
        .collect();

    if options.prune {
        for id in reverse_dependency_order(&orphaned, observed) {
            if let Some(record) = observed.get(&id) {
                actions.push(Action {
                    resource_id: id.clone(),
                    kind: record.kind,
                    operation: Operation::Delete,
                    spec: None,
                });
            }
        }
    }

    Ok(Plan::new(actions, orphaned))
}

/// Plan the removal of everything currently recorded as applied.
///
/// Deletes are ordered dependents-first using the dependency edges
/// captured in the state records at apply time.
pub fn plan_destroy(observed: &ObservedState) -> Plan {
    let ids: Vec<String> = observed.existing().map(|(id, _)| id.clone()).collect();

    let mut actions = Vec::with_capacity(ids.len());
    for id in reverse_dependency_order(&ids, observed) {
        if let Some(record) = observed.get(&id) {
            actions.push(Action {
                resource_id: id.clone(),
                kind: record.kind,
                operation: Operation::Delete,
                spec: None,
            });
        }
    }

    Plan::new(actions, Vec::new())
}

/// Kahn's algorithm with the ready set kept sorted, so equal-rank
/// resources always come out in ascending id order and plans are
/// reproducible across runs.
fn topological_order(desired: &DesiredState) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for resource in &desired.resources {
        in_degree.entry(resource.id.as_str()).or_insert(0);
        for dependency in &resource.depends_on {
            *in_degree.entry(resource.id.as_str()).or_insert(0) += 1;
            dependents
                .entry(dependency.as_str())
                .or_default()
                .push(resource.id.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());

        if let Some(ids) = dependents.get(id) {
            for dependent in ids {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let remaining: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(id, _)| *id)
            .collect();
        return Err(SpecError::Cycle(remaining.join(", ")));
    }

    Ok(order)
}

/// Topological order over the recorded depends-on edges restricted to
/// `ids`, reversed, so dependents are deleted before their dependencies.
/// Stale state could in principle record a cycle; leftovers are appended
/// in id order rather than dropped.
fn reverse_dependency_order(ids: &[String], observed: &ObservedState) -> Vec<String> {
    let set: BTreeSet<&str> = ids.iter().map(String::as_str).collect();

    let mut in_degree: BTreeMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for id in &set {
        if let Some(record) = observed.get(id) {
            for dependency in &record.depends_on {
                if set.contains(dependency.as_str()) {
                    if let Some(degree) = in_degree.get_mut(*id) {
                        *degree += 1;
                    }
                    dependents
                        .entry(dependency.as_str())
                        .or_default()
                        .push(*id);
                }
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(set.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());

        if let Some(ids) = dependents.get(id) {
            for dependent in ids {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    for (id, degree) in &in_degree {
        if *degree > 0 {
            order.push(id.to_string());
        }
    }

    order.reverse();
    order
}
