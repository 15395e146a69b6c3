//! Groundwork cloud boundary
//!
//! This crate provides the provider abstraction and persistent state for
//! Groundwork, enabling declarative management of the tracking-server
//! stack against any cloud control plane.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Groundwork CLI                   │
//! │            (ground plan/apply/destroy)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              groundwork-engine                   │
//! │        Planner (topo sort + diff)                │
//! │        Executor (retry + state updates)          │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               groundwork-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          Provider Abstraction             │   │
//! │  │  trait ResourceProvider { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  Plan types  │  │  State store │             │
//! │  └──────────────┘  └──────────────┘             │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//!                 ┌───────▼───────┐
//!                 │      gcp      │
//!                 │   provider    │
//!                 └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod state;

// Re-exports
pub use action::{Action, Operation, Plan, PlanSummary};
pub use error::{ErrorClass, ProviderError, Result};
pub use provider::{AuthStatus, ProviderHandle, ResourceProvider, RetryConfig};
pub use state::{ObservedRecord, ObservedState, StateLock, StateResult, StateStore, StateStoreError};
