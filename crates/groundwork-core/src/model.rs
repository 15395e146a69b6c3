//! Resource model for the desired-state graph

use crate::error::{Result, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kinds of infrastructure resources the engine can manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Managed database instance (the machine running the database engine)
    DatabaseInstance,
    /// Logical database on an instance
    Database,
    /// Database user account on an instance
    DatabaseUser,
    /// Object storage bucket, optionally with a lifecycle policy
    StorageBucket,
    /// Container image reference (built and pushed out-of-band)
    ContainerImage,
    /// Deployed container service wired to the other resources
    DeployedService,
}

impl ResourceKind {
    /// Parse the kind string used in stack files
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "database-instance" => Some(Self::DatabaseInstance),
            "database" => Some(Self::Database),
            "database-user" => Some(Self::DatabaseUser),
            "storage-bucket" => Some(Self::StorageBucket),
            "container-image" => Some(Self::ContainerImage),
            "deployed-service" => Some(Self::DeployedService),
            _ => None,
        }
    }

    /// Kind string as written in stack files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseInstance => "database-instance",
            Self::Database => "database",
            Self::DatabaseUser => "database-user",
            Self::StorageBucket => "storage-bucket",
            Self::ContainerImage => "container-image",
            Self::DeployedService => "deployed-service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scalar attribute value from a stack file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Attribute mapping for one resource.
///
/// A BTreeMap keeps iteration order stable so spec hashes and rendered
/// plans are deterministic across runs.
pub type Attributes = BTreeMap<String, AttrValue>;

/// One declared resource in the desired-state graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Stable logical name, unique within a stack
    pub id: String,

    pub kind: ResourceKind,

    /// Opaque to the planner; interpreted by the provider for this kind
    #[serde(default)]
    pub attributes: Attributes,

    /// Ids of resources that must exist and be ready before this one
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttrValue::as_str)
    }

    pub fn attr_integer(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(AttrValue::as_integer)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(AttrValue::as_bool)
    }

    /// Content hash over kind and attributes.
    ///
    /// Recorded in the state store at apply time; a differing hash on a
    /// later run means the declared resource drifted from what was applied.
    pub fn spec_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.as_str().as_bytes());
        for (key, value) in &self.attributes {
            hasher.update(b"\n");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Cloud provider settings from the stack file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider name (e.g. "gcp")
    pub name: String,

    pub project: Option<String>,

    pub region: Option<String>,

    /// Additional provider-specific settings
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Complete target topology for one invocation.
///
/// Constructed per invocation from the stack file and discarded after
/// planning; only the state store persists across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesiredState {
    /// Stack name, used to tag provider-side resources
    pub project: String,

    pub resources: Vec<ResourceSpec>,

    pub provider: Option<ProviderSettings>,
}

impl DesiredState {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            resources: Vec::new(),
            provider: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn add(&mut self, spec: ResourceSpec) {
        self.resources.push(spec);
    }

    /// Reject duplicate ids and depends_on edges pointing at nothing.
    ///
    /// Cycle detection happens during planning; this check is cheap enough
    /// to run on every load.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for resource in &self.resources {
            if !seen.insert(resource.id.as_str()) {
                return Err(SpecError::DuplicateId(resource.id.clone()));
            }
        }

        for resource in &self.resources {
            for dependency in &resource.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(SpecError::UnknownDependency {
                        id: resource.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
