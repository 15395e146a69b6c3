//! Resource provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use groundwork_core::{Attributes, ResourceKind, ResourceSpec};
use serde::{Deserialize, Serialize};

/// Opaque identifier a provider assigns to a resource it manages.
///
/// Recorded in the state store after a successful create; later update,
/// describe and delete calls address the resource through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderHandle(String);

impl ProviderHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloud control plane abstraction.
///
/// One implementation per cloud; the engine only ever talks to this trait.
/// Attribute interpretation is entirely the provider's business — the
/// planner treats attributes as an opaque mapping.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name (e.g. "gcp")
    fn name(&self) -> &str;

    /// Provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Look up a declared resource on the provider side.
    ///
    /// Returns the provider handle when the resource is present.
    async fn exists(&self, spec: &ResourceSpec) -> Result<Option<ProviderHandle>>;

    /// Create the resource described by `spec`
    async fn create(&self, spec: &ResourceSpec) -> Result<ProviderHandle>;

    /// Update an existing resource to match `spec`
    async fn update(&self, handle: &ProviderHandle, spec: &ResourceSpec)
    -> Result<ProviderHandle>;

    /// Delete the resource behind `handle`
    async fn delete(&self, kind: ResourceKind, handle: &ProviderHandle) -> Result<()>;

    /// Fetch the provider-side attributes of an existing resource
    async fn describe(&self, kind: ResourceKind, handle: &ProviderHandle) -> Result<Attributes>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the retry following `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 2.0,
        };

        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(2), 4000);
        assert_eq!(config.delay_for_attempt(3), 8000);
        assert_eq!(config.delay_for_attempt(4), 10000); // capped at max
    }
}
