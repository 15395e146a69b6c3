//! gcloud CLI wrapper
//!
//! Wraps the gcloud CLI for Google Cloud operations. Every invocation is
//! scoped to one project and region, asks for JSON output where a result
//! is parsed, and runs with `--quiet` so nothing ever prompts. Arguments
//! carrying secrets are appended outside the logged command line.

use crate::error::{GcpError, Result, is_not_found};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// gcloud CLI wrapper
pub struct Gcloud {
    project: String,
    region: String,
}

impl Gcloud {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Check that gcloud is installed and an account is active
    pub async fn check_auth(&self) -> Result<Vec<AuthAccount>> {
        let which = Command::new("which").arg("gcloud").output().await?;
        if !which.status.success() {
            return Err(GcpError::GcloudNotFound);
        }

        let output = self
            .run_json(&["auth", "list", "--filter=status:ACTIVE"], &[])
            .await?;

        let accounts: Vec<AuthAccount> = serde_json::from_str(&output)?;
        Ok(accounts)
    }

    /// Run a gcloud command and return stdout
    async fn run(&self, args: &[&str], secret_args: &[String]) -> Result<String> {
        let mut cmd = Command::new("gcloud");
        cmd.args(args);
        for arg in secret_args {
            cmd.arg(arg);
        }
        cmd.arg("--project").arg(&self.project);
        cmd.arg("--quiet");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // Secret-bearing arguments are never logged
        tracing::debug!(
            "Running: gcloud {} --project {}{}",
            args.join(" "),
            self.project,
            if secret_args.is_empty() {
                ""
            } else {
                " [redacted]"
            }
        );

        let output = cmd.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GcpError::CommandFailed {
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run a gcloud command with `--format=json` and return stdout
    async fn run_json(&self, args: &[&str], secret_args: &[String]) -> Result<String> {
        let mut full = args.to_vec();
        full.push("--format");
        full.push("json");
        self.run(&full, secret_args).await
    }

    // --- Cloud SQL instances ---

    pub async fn describe_sql_instance(&self, name: &str) -> Result<Option<SqlInstanceInfo>> {
        match self
            .run_json(&["sql", "instances", "describe", name], &[])
            .await
        {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(GcpError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_sql_instance(&self, config: &CreateSqlInstanceConfig) -> Result<()> {
        let storage = config.storage_gb.map(|gb| format!("{}GB", gb));

        let mut args = vec![
            "sql",
            "instances",
            "create",
            config.name.as_str(),
            "--tier",
            config.tier.as_str(),
            "--region",
            config.region.as_str(),
            "--database-version",
            config.database_version.as_str(),
        ];

        if let Some(ref storage) = storage {
            args.push("--storage-size");
            args.push(storage.as_str());
        }

        let mut secret_args = Vec::new();
        if let Some(ref password) = config.root_password {
            secret_args.push(format!("--root-password={}", password));
        }

        self.run(&args, &secret_args).await?;
        Ok(())
    }

    pub async fn patch_sql_instance(
        &self,
        name: &str,
        tier: Option<&str>,
        storage_gb: Option<i64>,
    ) -> Result<()> {
        let storage = storage_gb.map(|gb| format!("{}GB", gb));

        let mut args = vec!["sql", "instances", "patch", name];
        if let Some(tier) = tier {
            args.push("--tier");
            args.push(tier);
        }
        if let Some(ref storage) = storage {
            args.push("--storage-size");
            args.push(storage.as_str());
        }

        self.run(&args, &[]).await?;
        Ok(())
    }

    pub async fn delete_sql_instance(&self, name: &str) -> Result<()> {
        self.run(&["sql", "instances", "delete", name], &[]).await?;
        Ok(())
    }

    // --- Cloud SQL databases ---

    pub async fn describe_sql_database(
        &self,
        instance: &str,
        name: &str,
    ) -> Result<Option<SqlDatabaseInfo>> {
        let instance_flag = format!("--instance={}", instance);
        match self
            .run_json(
                &["sql", "databases", "describe", name, instance_flag.as_str()],
                &[],
            )
            .await
        {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(GcpError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_sql_database(&self, instance: &str, name: &str) -> Result<()> {
        let instance_flag = format!("--instance={}", instance);
        self.run(
            &["sql", "databases", "create", name, instance_flag.as_str()],
            &[],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_sql_database(&self, instance: &str, name: &str) -> Result<()> {
        let instance_flag = format!("--instance={}", instance);
        self.run(
            &["sql", "databases", "delete", name, instance_flag.as_str()],
            &[],
        )
        .await?;
        Ok(())
    }

    // --- Cloud SQL users ---

    /// `sql users describe` has no stable output; list and find instead
    pub async fn find_sql_user(&self, instance: &str, name: &str) -> Result<Option<SqlUserInfo>> {
        let instance_flag = format!("--instance={}", instance);
        let output = self
            .run_json(&["sql", "users", "list", instance_flag.as_str()], &[])
            .await?;

        if output.trim().is_empty() || output.trim() == "[]" {
            return Ok(None);
        }

        let users: Vec<SqlUserInfo> = serde_json::from_str(&output)?;
        Ok(users.into_iter().find(|u| u.name == name))
    }

    pub async fn create_sql_user(&self, instance: &str, name: &str, password: &str) -> Result<()> {
        let instance_flag = format!("--instance={}", instance);
        let secret_args = vec![format!("--password={}", password)];
        self.run(
            &["sql", "users", "create", name, instance_flag.as_str()],
            &secret_args,
        )
        .await?;
        Ok(())
    }

    pub async fn set_sql_user_password(
        &self,
        instance: &str,
        name: &str,
        password: &str,
    ) -> Result<()> {
        let instance_flag = format!("--instance={}", instance);
        let secret_args = vec![format!("--password={}", password)];
        self.run(
            &["sql", "users", "set-password", name, instance_flag.as_str()],
            &secret_args,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_sql_user(&self, instance: &str, name: &str) -> Result<()> {
        let instance_flag = format!("--instance={}", instance);
        self.run(
            &["sql", "users", "delete", name, instance_flag.as_str()],
            &[],
        )
        .await?;
        Ok(())
    }

    // --- Cloud Storage buckets ---

    pub async fn describe_bucket(&self, name: &str) -> Result<Option<BucketInfo>> {
        let url = bucket_url(name);
        match self
            .run_json(&["storage", "buckets", "describe", url.as_str()], &[])
            .await
        {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(GcpError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create_bucket(&self, config: &CreateBucketConfig) -> Result<()> {
        let url = bucket_url(&config.name);

        let mut args = vec![
            "storage",
            "buckets",
            "create",
            url.as_str(),
            "--location",
            config.location.as_str(),
        ];
        if config.uniform_access {
            args.push("--uniform-bucket-level-access");
        }

        self.run(&args, &[]).await?;
        Ok(())
    }

    /// Apply an age-based delete lifecycle rule.
    ///
    /// gcloud only accepts lifecycle policy as a file, so the rule is
    /// written to a temp file for the duration of the call.
    pub async fn set_bucket_lifecycle(&self, name: &str, age_days: i64) -> Result<()> {
        let policy = serde_json::json!({
            "rule": [{
                "action": { "type": "Delete" },
                "condition": { "age": age_days },
            }]
        });

        let file = tempfile::NamedTempFile::new()?;
        tokio::fs::write(file.path(), serde_json::to_vec_pretty(&policy)?).await?;

        let url = bucket_url(name);
        let lifecycle_flag = format!("--lifecycle-file={}", file.path().display());
        self.run(
            &[
                "storage",
                "buckets",
                "update",
                url.as_str(),
                lifecycle_flag.as_str(),
            ],
            &[],
        )
        .await?;
        Ok(())
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let url = bucket_url(name);
        self.run(&["storage", "buckets", "delete", url.as_str()], &[])
            .await?;
        Ok(())
    }

    // --- Container images ---

    pub async fn describe_image(&self, reference: &str) -> Result<Option<ImageInfo>> {
        match self
            .run_json(&["container", "images", "describe", reference], &[])
            .await
        {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(GcpError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // --- Cloud Run services ---

    pub async fn describe_run_service(&self, name: &str) -> Result<Option<RunServiceInfo>> {
        match self
            .run_json(
                &[
                    "run",
                    "services",
                    "describe",
                    name,
                    "--region",
                    self.region.as_str(),
                ],
                &[],
            )
            .await
        {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(GcpError::CommandFailed { stderr }) if is_not_found(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn deploy_run_service(&self, config: &RunDeployConfig) -> Result<()> {
        let port = config.port.to_string();
        let cloudsql_flag = config
            .cloudsql_instances
            .as_ref()
            .map(|instances| format!("--add-cloudsql-instances={}", instances));

        let mut args = vec![
            "run",
            "deploy",
            config.name.as_str(),
            "--image",
            config.image.as_str(),
            "--region",
            self.region.as_str(),
            "--port",
            port.as_str(),
        ];

        if config.allow_unauthenticated {
            args.push("--allow-unauthenticated");
        }
        if let Some(ref account) = config.service_account {
            args.push("--service-account");
            args.push(account.as_str());
        }
        if let Some(ref flag) = cloudsql_flag {
            args.push(flag.as_str());
        }

        // Environment values can carry connection secrets; keep the whole
        // flag out of the log line
        let mut secret_args = Vec::new();
        if !config.env.is_empty() {
            let joined = config
                .env
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(",");
            secret_args.push(format!("--set-env-vars={}", joined));
        }

        self.run(&args, &secret_args).await?;
        Ok(())
    }

    pub async fn delete_run_service(&self, name: &str) -> Result<()> {
        self.run(
            &[
                "run",
                "services",
                "delete",
                name,
                "--region",
                self.region.as_str(),
            ],
            &[],
        )
        .await?;
        Ok(())
    }
}

fn bucket_url(name: &str) -> String {
    if name.starts_with("gs://") {
        name.to_string()
    } else {
        format!("gs://{}", name)
    }
}

/// Active account from `gcloud auth list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthAccount {
    pub account: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// Cloud SQL instance from `sql instances describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlInstanceInfo {
    pub name: String,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(rename = "connectionName", default)]
    pub connection_name: Option<String>,

    #[serde(rename = "databaseVersion", default)]
    pub database_version: Option<String>,
}

impl SqlInstanceInfo {
    /// Whether the instance is up and accepting connections
    pub fn is_runnable(&self) -> bool {
        self.state.as_deref() == Some("RUNNABLE")
    }
}

/// Cloud SQL database from `sql databases describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlDatabaseInfo {
    pub name: String,

    #[serde(default)]
    pub charset: Option<String>,
}

/// Cloud SQL user from `sql users list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlUserInfo {
    pub name: String,

    #[serde(default)]
    pub host: Option<String>,
}

/// Bucket metadata from `storage buckets describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(rename = "storage_class", alias = "storageClass", default)]
    pub storage_class: Option<String>,
}

/// Image metadata from `container images describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub image_summary: Option<ImageSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummary {
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub fully_qualified_digest: Option<String>,
}

/// Cloud Run service from `run services describe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunServiceInfo {
    pub metadata: RunMetadata,

    #[serde(default)]
    pub status: Option<RunStatus>,
}

impl RunServiceInfo {
    pub fn url(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.url.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    #[serde(default)]
    pub url: Option<String>,
}

/// Configuration for creating a Cloud SQL instance
#[derive(Debug, Clone)]
pub struct CreateSqlInstanceConfig {
    pub name: String,
    pub tier: String,
    pub region: String,
    pub database_version: String,
    pub storage_gb: Option<i64>,
    pub root_password: Option<String>,
}

/// Configuration for creating a bucket
#[derive(Debug, Clone)]
pub struct CreateBucketConfig {
    pub name: String,
    pub location: String,
    pub uniform_access: bool,
}

/// Configuration for deploying a Cloud Run service
#[derive(Debug, Clone)]
pub struct RunDeployConfig {
    pub name: String,
    pub image: String,
    pub port: u16,
    pub env: Vec<(String, String)>,
    pub cloudsql_instances: Option<String>,
    pub service_account: Option<String>,
    pub allow_unauthenticated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_instance_decode() {
        let json = r#"{
            "name": "tracking-db-instance",
            "state": "RUNNABLE",
            "connectionName": "my-project:us-central1:tracking-db-instance",
            "databaseVersion": "POSTGRES_15"
        }"#;

        let info: SqlInstanceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.name, "tracking-db-instance");
        assert!(info.is_runnable());
        assert_eq!(
            info.connection_name.as_deref(),
            Some("my-project:us-central1:tracking-db-instance")
        );
    }

    #[test]
    fn test_run_service_decode() {
        let json = r#"{
            "metadata": { "name": "tracking-service" },
            "status": { "url": "https://tracking-service-xyz.a.run.app" }
        }"#;

        let info: RunServiceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.metadata.name, "tracking-service");
        assert_eq!(info.url(), Some("https://tracking-service-xyz.a.run.app"));
    }

    #[test]
    fn test_image_decode_without_summary() {
        let info: ImageInfo = serde_json::from_str("{}").unwrap();
        assert!(info.image_summary.is_none());
    }

    #[test]
    fn test_bucket_url() {
        assert_eq!(bucket_url("artifacts"), "gs://artifacts");
        assert_eq!(bucket_url("gs://artifacts"), "gs://artifacts");
    }
}
