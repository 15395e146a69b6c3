//! Google Cloud provider implementation
//!
//! Maps each [`ResourceKind`] onto the matching gcloud surface: Cloud SQL
//! (instance, database, user), Cloud Storage (bucket), Container Registry
//! (image reference) and Cloud Run (deployed service). Attribute
//! validation happens here, before anything reaches the control plane.

use crate::error::GcpError;
use crate::gcloud::{CreateBucketConfig, CreateSqlInstanceConfig, Gcloud, RunDeployConfig};
use async_trait::async_trait;
use groundwork_cloud::{AuthStatus, ProviderError, ProviderHandle, ResourceProvider, Result};
use groundwork_core::{Attributes, ProviderSettings, ResourceKind, ResourceSpec};

/// Environment variable holding the database password.
///
/// Read once at provider construction and handed to gcloud outside the
/// logged command line; never written into the state store.
pub const DB_PASSWORD_ENV: &str = "GROUNDWORK_DB_PASSWORD";

/// Secrets read once at startup
#[derive(Clone, Default)]
pub struct ProviderSecrets {
    pub db_password: Option<String>,
}

impl ProviderSecrets {
    pub fn from_env() -> Self {
        Self {
            db_password: std::env::var(DB_PASSWORD_ENV).ok(),
        }
    }
}

impl std::fmt::Debug for ProviderSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSecrets")
            .field("db_password", &self.db_password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Google Cloud provider
pub struct GcloudProvider {
    gcloud: Gcloud,
    secrets: ProviderSecrets,
}

impl GcloudProvider {
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        secrets: ProviderSecrets,
    ) -> Self {
        Self {
            gcloud: Gcloud::new(project, region),
            secrets,
        }
    }

    /// Build from stack file provider settings, reading secrets from the
    /// environment
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self> {
        let project = settings.project.clone().ok_or_else(|| {
            ProviderError::InvalidAttributes {
                resource: "provider".to_string(),
                message: "gcp provider requires a project".to_string(),
            }
        })?;
        let region = settings.region.clone().ok_or_else(|| {
            ProviderError::InvalidAttributes {
                resource: "provider".to_string(),
                message: "gcp provider requires a region".to_string(),
            }
        })?;

        Ok(Self::new(project, region, ProviderSecrets::from_env()))
    }

    fn db_password(&self, spec: &ResourceSpec) -> Result<&str> {
        self.secrets.db_password.as_deref().ok_or_else(|| {
            ProviderError::InvalidAttributes {
                resource: spec.id.clone(),
                message: format!(
                    "database credentials require the {} environment variable",
                    DB_PASSWORD_ENV
                ),
            }
        })
    }
}

#[async_trait]
impl ResourceProvider for GcloudProvider {
    fn name(&self) -> &str {
        "gcp"
    }

    fn display_name(&self) -> &str {
        "Google Cloud"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        match self.gcloud.check_auth().await {
            Ok(accounts) => match accounts.first() {
                Some(account) => Ok(AuthStatus::ok(account.account.clone())),
                None => Ok(AuthStatus::failed(
                    "no active gcloud account; run `gcloud auth login`",
                )),
            },
            Err(GcpError::GcloudNotFound) => Ok(AuthStatus::failed("gcloud is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn exists(&self, spec: &ResourceSpec) -> Result<Option<ProviderHandle>> {
        let handle = match spec.kind {
            ResourceKind::DatabaseInstance => self
                .gcloud
                .describe_sql_instance(resource_name(spec))
                .await
                .map_err(ProviderError::from)?
                .map(|info| ProviderHandle::new(info.name)),
            ResourceKind::Database => {
                let instance = require_str(spec, "instance")?;
                self.gcloud
                    .describe_sql_database(instance, resource_name(spec))
                    .await
                    .map_err(ProviderError::from)?
                    .map(|db| ProviderHandle::new(format!("{}/{}", instance, db.name)))
            }
            ResourceKind::DatabaseUser => {
                let instance = require_str(spec, "instance")?;
                self.gcloud
                    .find_sql_user(instance, resource_name(spec))
                    .await
                    .map_err(ProviderError::from)?
                    .map(|user| ProviderHandle::new(format!("{}/{}", instance, user.name)))
            }
            ResourceKind::StorageBucket => self
                .gcloud
                .describe_bucket(resource_name(spec))
                .await
                .map_err(ProviderError::from)?
                .map(|info| ProviderHandle::new(format!("gs://{}", info.name))),
            ResourceKind::ContainerImage => {
                let reference = require_str(spec, "reference")?;
                self.gcloud
                    .describe_image(reference)
                    .await
                    .map_err(ProviderError::from)?
                    .map(|_| ProviderHandle::new(reference))
            }
            ResourceKind::DeployedService => self
                .gcloud
                .describe_run_service(resource_name(spec))
                .await
                .map_err(ProviderError::from)?
                .map(|info| ProviderHandle::new(info.metadata.name)),
        };

        Ok(handle)
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<ProviderHandle> {
        match spec.kind {
            ResourceKind::DatabaseInstance => {
                let config = sql_instance_config(
                    spec,
                    self.gcloud.region(),
                    self.secrets.db_password.as_deref(),
                )?;
                self.gcloud.create_sql_instance(&config).await?;
                Ok(ProviderHandle::new(config.name))
            }
            ResourceKind::Database => {
                let instance = require_str(spec, "instance")?;
                let name = resource_name(spec);
                self.gcloud.create_sql_database(instance, name).await?;
                Ok(ProviderHandle::new(format!("{}/{}", instance, name)))
            }
            ResourceKind::DatabaseUser => {
                let instance = require_str(spec, "instance")?;
                let name = resource_name(spec);
                let password = self.db_password(spec)?;
                self.gcloud.create_sql_user(instance, name, password).await?;
                Ok(ProviderHandle::new(format!("{}/{}", instance, name)))
            }
            ResourceKind::StorageBucket => {
                let config = bucket_config(spec, self.gcloud.region())?;
                self.gcloud.create_bucket(&config).await?;
                if let Some(days) = spec.attr_integer("lifecycle-days") {
                    self.gcloud.set_bucket_lifecycle(&config.name, days).await?;
                }
                Ok(ProviderHandle::new(format!("gs://{}", config.name)))
            }
            ResourceKind::ContainerImage => {
                // Built and pushed out-of-band; creating the resource means
                // verifying the reference resolves
                let reference = require_str(spec, "reference")?;
                match self.gcloud.describe_image(reference).await? {
                    Some(_) => Ok(ProviderHandle::new(reference)),
                    None => Err(ProviderError::NotFound(format!(
                        "image {} not found; build and push it first",
                        reference
                    ))),
                }
            }
            ResourceKind::DeployedService => {
                let config = service_config(spec)?;
                self.gcloud.deploy_run_service(&config).await?;
                Ok(ProviderHandle::new(config.name))
            }
        }
    }

    async fn update(
        &self,
        handle: &ProviderHandle,
        spec: &ResourceSpec,
    ) -> Result<ProviderHandle> {
        match spec.kind {
            ResourceKind::DatabaseInstance => {
                self.gcloud
                    .patch_sql_instance(
                        handle.as_str(),
                        spec.attr_str("tier"),
                        spec.attr_integer("storage-gb"),
                    )
                    .await?;
                Ok(handle.clone())
            }
            // Nothing patchable on a logical database
            ResourceKind::Database => Ok(handle.clone()),
            ResourceKind::DatabaseUser => {
                let instance = require_str(spec, "instance")?;
                let name = resource_name(spec);
                let password = self.db_password(spec)?;
                self.gcloud
                    .set_sql_user_password(instance, name, password)
                    .await?;
                Ok(handle.clone())
            }
            ResourceKind::StorageBucket => {
                let config = bucket_config(spec, self.gcloud.region())?;
                if let Some(days) = spec.attr_integer("lifecycle-days") {
                    self.gcloud.set_bucket_lifecycle(&config.name, days).await?;
                }
                Ok(handle.clone())
            }
            ResourceKind::ContainerImage => {
                let reference = require_str(spec, "reference")?;
                match self.gcloud.describe_image(reference).await? {
                    Some(_) => Ok(ProviderHandle::new(reference)),
                    None => Err(ProviderError::NotFound(format!(
                        "image {} not found; build and push it first",
                        reference
                    ))),
                }
            }
            ResourceKind::DeployedService => {
                // Cloud Run deploy is an upsert
                let config = service_config(spec)?;
                self.gcloud.deploy_run_service(&config).await?;
                Ok(ProviderHandle::new(config.name))
            }
        }
    }

    async fn delete(&self, kind: ResourceKind, handle: &ProviderHandle) -> Result<()> {
        match kind {
            ResourceKind::DatabaseInstance => {
                self.gcloud.delete_sql_instance(handle.as_str()).await?;
            }
            ResourceKind::Database => {
                let (instance, name) = split_handle(kind, handle)?;
                self.gcloud.delete_sql_database(instance, name).await?;
            }
            ResourceKind::DatabaseUser => {
                let (instance, name) = split_handle(kind, handle)?;
                self.gcloud.delete_sql_user(instance, name).await?;
            }
            ResourceKind::StorageBucket => {
                self.gcloud.delete_bucket(handle.as_str()).await?;
            }
            ResourceKind::ContainerImage => {
                // A reference to an externally-managed image; nothing to
                // remove on the provider side
                tracing::debug!("image reference {} dropped without deletion", handle);
            }
            ResourceKind::DeployedService => {
                self.gcloud.delete_run_service(handle.as_str()).await?;
            }
        }
        Ok(())
    }

    async fn describe(&self, kind: ResourceKind, handle: &ProviderHandle) -> Result<Attributes> {
        let mut attributes = Attributes::new();

        match kind {
            ResourceKind::DatabaseInstance => {
                let info = self
                    .gcloud
                    .describe_sql_instance(handle.as_str())
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(state) = info.state {
                    attributes.insert("state".to_string(), state.into());
                }
                if let Some(connection) = info.connection_name {
                    attributes.insert("connection-name".to_string(), connection.into());
                }
                if let Some(version) = info.database_version {
                    attributes.insert("database-version".to_string(), version.into());
                }
            }
            ResourceKind::Database => {
                let (instance, name) = split_handle(kind, handle)?;
                let info = self
                    .gcloud
                    .describe_sql_database(instance, name)
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(charset) = info.charset {
                    attributes.insert("charset".to_string(), charset.into());
                }
            }
            ResourceKind::DatabaseUser => {
                let (instance, name) = split_handle(kind, handle)?;
                let info = self
                    .gcloud
                    .find_sql_user(instance, name)
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(host) = info.host {
                    attributes.insert("host".to_string(), host.into());
                }
            }
            ResourceKind::StorageBucket => {
                let info = self
                    .gcloud
                    .describe_bucket(handle.as_str())
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(location) = info.location {
                    attributes.insert("location".to_string(), location.into());
                }
                if let Some(class) = info.storage_class {
                    attributes.insert("storage-class".to_string(), class.into());
                }
            }
            ResourceKind::ContainerImage => {
                let info = self
                    .gcloud
                    .describe_image(handle.as_str())
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(digest) = info.image_summary.and_then(|s| s.digest) {
                    attributes.insert("digest".to_string(), digest.into());
                }
            }
            ResourceKind::DeployedService => {
                let info = self
                    .gcloud
                    .describe_run_service(handle.as_str())
                    .await
                    .map_err(ProviderError::from)?
                    .ok_or_else(|| ProviderError::NotFound(handle.to_string()))?;
                if let Some(url) = info.url() {
                    attributes.insert("url".to_string(), url.into());
                }
            }
        }

        Ok(attributes)
    }
}

/// Provider-side name of a resource, defaulting to the logical id
fn resource_name(spec: &ResourceSpec) -> &str {
    spec.attr_str("name").unwrap_or(&spec.id)
}

fn require_str<'a>(spec: &'a ResourceSpec, key: &str) -> Result<&'a str> {
    spec.attr_str(key)
        .ok_or_else(|| ProviderError::InvalidAttributes {
            resource: spec.id.clone(),
            message: format!("missing required attribute \"{}\"", key),
        })
}

fn split_handle(kind: ResourceKind, handle: &ProviderHandle) -> Result<(&str, &str)> {
    handle
        .as_str()
        .split_once('/')
        .ok_or_else(|| ProviderError::ApiError(format!("malformed {} handle: {}", kind, handle)))
}

fn sql_instance_config(
    spec: &ResourceSpec,
    default_region: &str,
    root_password: Option<&str>,
) -> Result<CreateSqlInstanceConfig> {
    Ok(CreateSqlInstanceConfig {
        name: resource_name(spec).to_string(),
        tier: require_str(spec, "tier")?.to_string(),
        region: spec
            .attr_str("region")
            .unwrap_or(default_region)
            .to_string(),
        database_version: spec
            .attr_str("database-version")
            .unwrap_or("POSTGRES_15")
            .to_string(),
        storage_gb: spec.attr_integer("storage-gb"),
        root_password: root_password.map(str::to_string),
    })
}

fn bucket_config(spec: &ResourceSpec, default_region: &str) -> Result<CreateBucketConfig> {
    Ok(CreateBucketConfig {
        name: resource_name(spec).to_string(),
        location: spec
            .attr_str("location")
            .unwrap_or(default_region)
            .to_string(),
        uniform_access: spec.attr_bool("uniform-access").unwrap_or(true),
    })
}

/// Validate and assemble the Cloud Run deployment.
///
/// The workload refuses to start without its connection parameters, so an
/// absent image, port, or empty `env.*` value is rejected here instead of
/// surfacing later as a crash-looping service.
fn service_config(spec: &ResourceSpec) -> Result<RunDeployConfig> {
    let image = require_str(spec, "image")?.to_string();

    let port = spec
        .attr_integer("port")
        .ok_or_else(|| ProviderError::InvalidAttributes {
            resource: spec.id.clone(),
            message: "missing required attribute \"port\"".to_string(),
        })?;
    if !(1..=65535).contains(&port) {
        return Err(ProviderError::InvalidAttributes {
            resource: spec.id.clone(),
            message: format!("port {} is out of range", port),
        });
    }

    let mut env = Vec::new();
    for (key, value) in &spec.attributes {
        if let Some(name) = key.strip_prefix("env.") {
            let value = value.to_string();
            if value.is_empty() {
                return Err(ProviderError::InvalidAttributes {
                    resource: spec.id.clone(),
                    message: format!("connection parameter \"{}\" is empty", name),
                });
            }
            env.push((name.to_string(), value));
        }
    }

    Ok(RunDeployConfig {
        name: resource_name(spec).to_string(),
        image,
        port: port as u16,
        env,
        cloudsql_instances: spec.attr_str("cloudsql-instances").map(str::to_string),
        service_account: spec.attr_str("service-account").map(str::to_string),
        allow_unauthenticated: spec.attr_bool("allow-unauthenticated").unwrap_or(false),
    })
}
