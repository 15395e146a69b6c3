//! Google Cloud provider for Groundwork
//!
//! Implements the [`ResourceProvider`](groundwork_cloud::ResourceProvider)
//! trait on top of the `gcloud` CLI: Cloud SQL for the database resources,
//! Cloud Storage for the bucket, Artifact/Container Registry for the image
//! reference, and Cloud Run for the deployed service.

pub mod error;
pub mod gcloud;
pub mod provider;

pub use error::{GcpError, Result};
pub use gcloud::Gcloud;
pub use provider::{DB_PASSWORD_ENV, GcloudProvider, ProviderSecrets};
