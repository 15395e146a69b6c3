//! Plan execution
//!
//! Applies a plan's actions strictly in the plan's order — the plan
//! already encodes the dependency order, so the executor never reorders
//! or parallelizes across an edge. After every successful provider call
//! the state store is updated before the next action starts; that write
//! is what makes an interrupted run resumable.

use crate::error::Result;
use groundwork_cloud::{
    Action, ErrorClass, ObservedRecord, Operation, Plan, ProviderError, ProviderHandle,
    ResourceProvider, RetryConfig, StateStore,
};
use groundwork_core::ResourceSpec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Cooperative cancellation flag.
///
/// Checked between actions only — provider calls have no interrupt
/// primitive, so an in-flight call always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one plan action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStatus {
    /// Created or updated, recorded in the state store
    Applied,
    /// Already matched the recorded spec hash; no provider call
    Skipped,
    /// Deletion confirmed by the provider
    Deleted,
    /// Provider call failed (after retries, for transient errors)
    Failed { class: ErrorClass, message: String },
    /// Never attempted because an earlier action failed or the run was
    /// cancelled
    NotApplied,
}

/// Per-action result in an [`ApplyReport`]
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub resource_id: String,
    pub operation: Operation,
    pub status: ApplyStatus,
}

/// Result of applying a plan.
///
/// Always consistent with the state store: a resource shows as Applied
/// here exactly when its record was persisted.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub outcomes: Vec<ActionOutcome>,

    /// Whether the run stopped on a cancellation request
    pub cancelled: bool,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self.outcomes.iter().all(|o| {
                matches!(
                    o.status,
                    ApplyStatus::Applied | ApplyStatus::Skipped | ApplyStatus::Deleted
                )
            })
    }

    /// The failing outcome, if any
    pub fn failure(&self) -> Option<&ActionOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.status, ApplyStatus::Failed { .. }))
    }

    pub fn summary(&self) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                ApplyStatus::Applied => summary.applied += 1,
                ApplyStatus::Skipped => summary.skipped += 1,
                ApplyStatus::Deleted => summary.deleted += 1,
                ApplyStatus::Failed { .. } => summary.failed += 1,
                ApplyStatus::NotApplied => summary.not_applied += 1,
            }
        }
        summary
    }
}

/// Counts per outcome for one apply run
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub not_applied: usize,
}

/// Applies plans against a resource provider
pub struct Executor {
    retry: RetryConfig,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl Executor {
    pub fn new(retry: RetryConfig) -> Self {
        Self { retry }
    }

    /// Apply a plan's actions in sequence.
    ///
    /// Provider failures stop the run and are reported per-resource; the
    /// only hard error is state persistence failing, in which case the
    /// invocation aborts rather than risk double-applying on a rerun.
    pub async fn apply(
        &self,
        plan: &Plan,
        provider: &dyn ResourceProvider,
        store: &mut StateStore,
        cancel: &CancelToken,
    ) -> Result<ApplyReport> {
        let started = Instant::now();
        let mut report = ApplyReport::default();

        for (index, action) in plan.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(
                    "cancellation requested, stopping before '{}'",
                    action.resource_id
                );
                report.cancelled = true;
                mark_not_applied(&mut report, &plan.actions[index..]);
                break;
            }

            match action.operation {
                Operation::Skip => {
                    report.outcomes.push(outcome(action, ApplyStatus::Skipped));
                }
                Operation::Create | Operation::Update => {
                    let Some(spec) = action.spec.as_ref() else {
                        report.outcomes.push(outcome(
                            action,
                            ApplyStatus::Failed {
                                class: ErrorClass::Permanent,
                                message: "plan action carries no spec".to_string(),
                            },
                        ));
                        mark_not_applied(&mut report, &plan.actions[index + 1..]);
                        break;
                    };

                    let existing = store
                        .get(&action.resource_id)
                        .and_then(|r| r.provider_handle.clone());

                    match self.converge(provider, action, spec, existing.as_ref()).await {
                        Ok(handle) => {
                            store
                                .put(action.resource_id.clone(), ObservedRecord::applied(spec, handle))
                                .await?;
                            tracing::info!("applied '{}'", action.resource_id);
                            report.outcomes.push(outcome(action, ApplyStatus::Applied));
                        }
                        Err(e) => {
                            tracing::warn!("apply failed on '{}': {}", action.resource_id, e);
                            report.outcomes.push(outcome(
                                action,
                                ApplyStatus::Failed {
                                    class: e.class(),
                                    message: e.to_string(),
                                },
                            ));
                            mark_not_applied(&mut report, &plan.actions[index + 1..]);
                            break;
                        }
                    }
                }
                Operation::Delete => {
                    let handle = store
                        .get(&action.resource_id)
                        .and_then(|r| r.provider_handle.clone());

                    let result = match handle {
                        // Nothing recorded on the provider side
                        None => Ok(()),
                        Some(handle) => self.remove(provider, action, &handle).await,
                    };

                    match result {
                        Ok(()) => {
                            store
                                .put(action.resource_id.clone(), ObservedRecord::deleted(action.kind))
                                .await?;
                            tracing::info!("deleted '{}'", action.resource_id);
                            report.outcomes.push(outcome(action, ApplyStatus::Deleted));
                        }
                        Err(e) => {
                            tracing::warn!("delete failed on '{}': {}", action.resource_id, e);
                            report.outcomes.push(outcome(
                                action,
                                ApplyStatus::Failed {
                                    class: e.class(),
                                    message: e.to_string(),
                                },
                            ));
                            mark_not_applied(&mut report, &plan.actions[index + 1..]);
                            break;
                        }
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Create or update one resource, retrying transient failures with
    /// exponential backoff
    async fn converge(
        &self,
        provider: &dyn ResourceProvider,
        action: &Action,
        spec: &ResourceSpec,
        existing: Option<&ProviderHandle>,
    ) -> std::result::Result<ProviderHandle, ProviderError> {
        let mut attempt = 0;
        loop {
            let result = match (action.operation, existing) {
                (Operation::Update, Some(handle)) => provider.update(handle, spec).await,
                _ => provider.create(spec).await,
            };

            match result {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay_ms = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        "transient error on '{}' (attempt {}), retrying in {}ms: {}",
                        action.resource_id,
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Delete one resource with the same retry policy
    async fn remove(
        &self,
        provider: &dyn ResourceProvider,
        action: &Action,
        handle: &ProviderHandle,
    ) -> std::result::Result<(), ProviderError> {
        let mut attempt = 0;
        loop {
            match provider.delete(action.kind, handle).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay_ms = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        "transient error deleting '{}' (attempt {}), retrying in {}ms: {}",
                        action.resource_id,
                        attempt + 1,
                        delay_ms,
                        e
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn outcome(action: &Action, status: ApplyStatus) -> ActionOutcome {
    ActionOutcome {
        resource_id: action.resource_id.clone(),
        operation: action.operation,
        status,
    }
}

fn mark_not_applied(report: &mut ApplyReport, remaining: &[Action]) {
    for action in remaining {
        if report
            .outcomes
            .iter()
            .any(|o| o.resource_id == action.resource_id && o.operation == action.operation)
        {
            continue;
        }
        report.outcomes.push(outcome(action, ApplyStatus::NotApplied));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlanOptions, plan, plan_destroy};
    use async_trait::async_trait;
    use groundwork_cloud::AuthStatus;
    use groundwork_core::{Attributes, DesiredState, ResourceKind};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Scripted in-memory provider: records call counts and fails on
    /// demand, per resource id.
    #[derive(Default)]
    struct MockProvider {
        create_calls: Mutex<BTreeMap<String, u32>>,
        delete_calls: Mutex<BTreeMap<String, u32>>,
        transient_failures: Mutex<BTreeMap<String, u32>>,
        permanent_failures: Mutex<BTreeMap<String, ()>>,
    }

    impl MockProvider {
        fn fail_transient(self, id: &str, times: u32) -> Self {
            self.transient_failures
                .lock()
                .unwrap()
                .insert(id.to_string(), times);
            self
        }

        fn fail_permanent(self, id: &str) -> Self {
            self.permanent_failures
                .lock()
                .unwrap()
                .insert(id.to_string(), ());
            self
        }

        fn create_count(&self, id: &str) -> u32 {
            *self.create_calls.lock().unwrap().get(id).unwrap_or(&0)
        }

        fn delete_count(&self, id: &str) -> u32 {
            *self.delete_calls.lock().unwrap().get(id).unwrap_or(&0)
        }

        fn check_failures(&self, id: &str) -> std::result::Result<(), ProviderError> {
            if self.permanent_failures.lock().unwrap().contains_key(id) {
                return Err(ProviderError::PermissionDenied(format!(
                    "denied for {}",
                    id
                )));
            }
            let mut transient = self.transient_failures.lock().unwrap();
            if let Some(remaining) = transient.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ProviderError::Unavailable(format!("503 for {}", id)));
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn display_name(&self) -> &str {
            "Mock Provider"
        }

        async fn check_auth(&self) -> groundwork_cloud::Result<AuthStatus> {
            Ok(AuthStatus::ok("mock-account"))
        }

        async fn exists(
            &self,
            _spec: &ResourceSpec,
        ) -> groundwork_cloud::Result<Option<ProviderHandle>> {
            Ok(None)
        }

        async fn create(&self, spec: &ResourceSpec) -> groundwork_cloud::Result<ProviderHandle> {
            *self
                .create_calls
                .lock()
                .unwrap()
                .entry(spec.id.clone())
                .or_insert(0) += 1;
            self.check_failures(&spec.id)?;
            Ok(ProviderHandle::new(format!("mock/{}", spec.id)))
        }

        async fn update(
            &self,
            _handle: &ProviderHandle,
            spec: &ResourceSpec,
        ) -> groundwork_cloud::Result<ProviderHandle> {
            self.check_failures(&spec.id)?;
            Ok(ProviderHandle::new(format!("mock/{}", spec.id)))
        }

        async fn delete(
            &self,
            _kind: ResourceKind,
            handle: &ProviderHandle,
        ) -> groundwork_cloud::Result<()> {
            let id = handle.as_str().trim_start_matches("mock/").to_string();
            *self.delete_calls.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
            self.check_failures(&id)
        }

        async fn describe(
            &self,
            _kind: ResourceKind,
            _handle: &ProviderHandle,
        ) -> groundwork_cloud::Result<Attributes> {
            Ok(Attributes::new())
        }
    }

    fn tracking_stack() -> DesiredState {
        let mut desired = DesiredState::new("tracking");
        desired.add(
            ResourceSpec::new("a", ResourceKind::DatabaseInstance)
                .with_attribute("tier", "db-f1-micro"),
        );
        desired.add(ResourceSpec::new("b", ResourceKind::Database).with_dependency("a"));
        desired.add(ResourceSpec::new("c", ResourceKind::StorageBucket));
        desired.add(
            ResourceSpec::new("d", ResourceKind::DeployedService)
                .with_dependency("b")
                .with_dependency("c"),
        );
        desired
    }

    fn fast_executor() -> Executor {
        Executor::new(RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            multiplier: 2.0,
        })
    }

    fn status_of<'a>(report: &'a ApplyReport, id: &str) -> &'a ApplyStatus {
        &report
            .outcomes
            .iter()
            .find(|o| o.resource_id == id)
            .unwrap_or_else(|| panic!("no outcome for '{}'", id))
            .status
    }

    #[tokio::test]
    async fn test_first_apply_then_skip_only_second_plan() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default();
        let desired = tracking_stack();

        let first = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&first, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary().applied, 4);

        // Idempotence: a second plan against the updated state is all Skip
        let second = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        assert!(!second.has_changes);
        assert!(second.actions.iter().all(|a| a.operation == Operation::Skip));

        let report = fast_executor()
            .apply(&second, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(report.summary().skipped, 4);
        assert_eq!(provider.create_count("a"), 1);
        assert_eq!(provider.create_count("d"), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_within_retries() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default().fail_transient("c", 2);
        let desired = tracking_stack();

        let the_plan = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&the_plan, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(provider.create_count("c"), 3);
    }

    #[tokio::test]
    async fn test_transient_exhaustion_stops_and_resumes() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default().fail_transient("c", 10);
        let desired = tracking_stack();

        let the_plan = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&the_plan, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(*status_of(&report, "a"), ApplyStatus::Applied);
        assert_eq!(*status_of(&report, "b"), ApplyStatus::Applied);
        assert!(matches!(
            status_of(&report, "c"),
            ApplyStatus::Failed {
                class: ErrorClass::Transient,
                ..
            }
        ));
        assert_eq!(*status_of(&report, "d"), ApplyStatus::NotApplied);
        assert_eq!(provider.create_count("c"), 3); // max_attempts

        // The store reflects exactly what was confirmed applied
        assert!(store.get("a").is_some_and(|r| r.exists));
        assert!(store.get("b").is_some_and(|r| r.exists));
        assert!(store.get("c").is_none());
        assert!(store.get("d").is_none());

        // Rerun with the failure gone: resumes at c without touching a, b
        let provider2 = MockProvider::default();
        let resume = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&resume, &provider2, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(provider2.create_count("a"), 0);
        assert_eq!(provider2.create_count("b"), 0);
        assert_eq!(provider2.create_count("c"), 1);
        assert_eq!(provider2.create_count("d"), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_aborts_without_retry() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default().fail_permanent("c");
        let desired = tracking_stack();

        let the_plan = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&the_plan, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(*status_of(&report, "a"), ApplyStatus::Applied);
        assert_eq!(*status_of(&report, "b"), ApplyStatus::Applied);
        assert!(matches!(
            status_of(&report, "c"),
            ApplyStatus::Failed {
                class: ErrorClass::Permanent,
                ..
            }
        ));
        assert_eq!(*status_of(&report, "d"), ApplyStatus::NotApplied);
        assert_eq!(provider.create_count("c"), 1); // no retries

        assert!(store.get("a").is_some_and(|r| r.exists));
        assert!(store.get("b").is_some_and(|r| r.exists));
        assert!(store.get("c").is_none());
        assert!(store.get("d").is_none());
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_actions() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default();
        let desired = tracking_stack();

        let cancel = CancelToken::new();
        cancel.cancel();

        let the_plan = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        let report = fast_executor()
            .apply(&the_plan, &provider, &mut store, &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(!report.is_success());
        assert_eq!(report.summary().not_applied, 4);
        assert_eq!(provider.create_count("a"), 0);
    }

    #[tokio::test]
    async fn test_destroy_deletes_and_flips_records() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default();
        let desired = tracking_stack();

        let up = plan(&desired, store.observed(), PlanOptions::default()).unwrap();
        fast_executor()
            .apply(&up, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        let down = plan_destroy(store.observed());
        let report = fast_executor()
            .apply(&down, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary().deleted, 4);
        assert_eq!(provider.delete_count("a"), 1);
        assert!(store.get("a").is_some_and(|r| !r.exists));
        assert!(store.get("d").is_some_and(|r| !r.exists));

        // Nothing left to destroy on a second run
        assert!(plan_destroy(store.observed()).actions.is_empty());
    }

    #[tokio::test]
    async fn test_prune_executes_only_orphan_delete() {
        let temp_dir = tempdir().unwrap();
        let mut store = StateStore::open(temp_dir.path()).await.unwrap();
        let provider = MockProvider::default();

        // Apply a stack containing a bucket that later disappears from it
        let mut old = tracking_stack();
        old.add(ResourceSpec::new("e", ResourceKind::StorageBucket));
        let up = plan(&old, store.observed(), PlanOptions::default()).unwrap();
        fast_executor()
            .apply(&up, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        let desired = tracking_stack();
        let pruned = plan(&desired, store.observed(), PlanOptions { prune: true }).unwrap();
        let report = fast_executor()
            .apply(&pruned, &provider, &mut store, &CancelToken::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary().deleted, 1);
        assert_eq!(provider.delete_count("e"), 1);
        assert_eq!(provider.delete_count("a"), 0);
        assert!(store.get("e").is_some_and(|r| !r.exists));
        assert!(store.get("a").is_some_and(|r| r.exists));
    }
}
