//! Plan and action types

use groundwork_core::{ResourceKind, ResourceSpec};
use serde::{Deserialize, Serialize};

/// Operation bridging desired and observed state for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Resource is absent and will be created
    Create,
    /// Resource exists but its spec hash drifted
    Update,
    /// Resource exists and matches the recorded spec hash
    Skip,
    /// Resource will be removed
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Skip => write!(f, "skip"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// One planned step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub resource_id: String,

    pub kind: ResourceKind,

    pub operation: Operation,

    /// Full spec for Create/Update; Delete addresses the resource through
    /// the handle recorded in the state store
    pub spec: Option<ResourceSpec>,
}

/// Ordered, immutable list of actions bridging desired and observed state.
///
/// Produced by the planner, consumed once by the executor. Action order is
/// the dependency order; the executor never reorders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,

    /// Resources recorded as applied but absent from the desired state.
    /// Reported, never auto-deleted; prune planning turns exactly this set
    /// into Delete actions.
    pub orphaned: Vec<String>,

    /// Whether the plan contains any non-Skip action
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>, orphaned: Vec<String>) -> Self {
        let has_changes = actions.iter().any(|a| a.operation != Operation::Skip);
        Self {
            actions,
            orphaned,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            orphaned: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by operation
    pub fn actions_by_operation(&self, operation: Operation) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.operation == operation)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_operation(Operation::Create).len(),
            update: self.actions_by_operation(Operation::Update).len(),
            delete: self.actions_by_operation(Operation::Delete).len(),
            skip: self.actions_by_operation(Operation::Skip).len(),
        }
    }
}

/// Summary of planned operations
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub skip: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.skip
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, operation: Operation) -> Action {
        Action {
            resource_id: id.to_string(),
            kind: ResourceKind::Database,
            operation,
            spec: None,
        }
    }

    #[test]
    fn test_has_changes() {
        let plan = Plan::new(vec![action("a", Operation::Skip)], Vec::new());
        assert!(!plan.has_changes);

        let plan = Plan::new(
            vec![action("a", Operation::Skip), action("b", Operation::Create)],
            Vec::new(),
        );
        assert!(plan.has_changes);
    }

    #[test]
    fn test_summary_display() {
        let plan = Plan::new(
            vec![
                action("a", Operation::Create),
                action("b", Operation::Create),
                action("c", Operation::Update),
                action("d", Operation::Skip),
            ],
            Vec::new(),
        );

        assert_eq!(
            plan.summary().to_string(),
            "2 to create, 1 to update, 0 to delete, 1 unchanged"
        );
    }
}
