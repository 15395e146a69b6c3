//! Groundwork engine
//!
//! The planner diffs a desired resource graph against recorded state and
//! produces a dependency-ordered plan; the executor applies that plan one
//! action at a time, persisting progress after every success so reruns
//! resume where an interrupted run stopped.

pub mod error;
pub mod executor;
pub mod planner;

pub use error::{EngineError, Result};
pub use executor::{
    ActionOutcome, ApplyReport, ApplyStatus, ApplySummary, CancelToken, Executor,
};
pub use planner::{PlanOptions, plan, plan_destroy};
