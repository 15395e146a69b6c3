//! Stack file parser
//!
//! Parses Groundwork's KDL stack files into a [`DesiredState`]. A stack
//! file declares the project name, optional provider settings, and the
//! resource graph:
//!
//! ```kdl
//! project "tracking"
//!
//! provider "gcp" {
//!     project "my-project"
//!     region "us-central1"
//! }
//!
//! resource "tracking-db" kind="database" {
//!     depends-on "tracking-db-instance"
//!     instance "tracking-db-instance"
//!     name "mlflow"
//! }
//! ```

use crate::error::{Result, SpecError};
use crate::model::{AttrValue, DesiredState, ProviderSettings, ResourceKind, ResourceSpec};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::path::Path;

/// Parse a stack file into a validated DesiredState
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<DesiredState> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_stack_string(&content, name)
}

/// Parse a stack document from a string
pub fn parse_stack_string(content: &str, default_project: String) -> Result<DesiredState> {
    let doc: KdlDocument = content.parse()?;

    let mut desired = DesiredState::new(default_project);

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                if let Some(project_name) =
                    node.entries().first().and_then(|e| e.value().as_string())
                {
                    desired.project = project_name.to_string();
                }
            }
            "provider" => {
                desired.provider = Some(parse_provider(node)?);
            }
            "resource" => {
                desired.add(parse_resource(node)?);
            }
            _ => {
                // Unknown top-level nodes are allowed and skipped
            }
        }
    }

    desired.validate()?;
    Ok(desired)
}

/// Parse a provider node
fn parse_provider(node: &KdlNode) -> Result<ProviderSettings> {
    let name = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| SpecError::InvalidConfig("provider requires a name".to_string()))?
        .to_string();

    let mut settings = ProviderSettings {
        name,
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let value = child
                .entries()
                .iter()
                .find(|e| e.name().is_none())
                .and_then(|e| e.value().as_string());

            match child.name().value() {
                "project" => settings.project = value.map(|s| s.to_string()),
                "region" => settings.region = value.map(|s| s.to_string()),
                // Additional settings are kept as opaque strings
                other => {
                    if let Some(v) = value {
                        settings.config.insert(other.to_string(), v.to_string());
                    }
                }
            }
        }
    }

    Ok(settings)
}

/// Parse a resource node
fn parse_resource(node: &KdlNode) -> Result<ResourceSpec> {
    let id = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| SpecError::InvalidConfig("resource requires an id".to_string()))?
        .to_string();

    let kind_str = node
        .entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some("kind"))
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| {
            SpecError::InvalidConfig(format!("resource \"{}\" requires a kind property", id))
        })?;

    let kind =
        ResourceKind::parse(kind_str).ok_or_else(|| SpecError::UnknownKind(kind_str.to_string()))?;

    let mut spec = ResourceSpec::new(id.clone(), kind);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "depends-on" => {
                    // Multiple dependencies may be given as arguments
                    for entry in child.entries() {
                        if entry.name().is_none() {
                            if let Some(dep) = entry.value().as_string() {
                                spec.depends_on.push(dep.to_string());
                            }
                        }
                    }
                }
                attr_name => {
                    let mut stored = false;

                    // Property entries become namespaced attributes, so
                    // `env FOO="bar"` is stored as `env.FOO`
                    for entry in child.entries() {
                        if let Some(prop) = entry.name() {
                            if let Some(value) = attr_value(entry.value()) {
                                spec.attributes
                                    .insert(format!("{}.{}", attr_name, prop.value()), value);
                                stored = true;
                            }
                        }
                    }

                    if !stored {
                        let value = child
                            .entries()
                            .iter()
                            .find(|e| e.name().is_none())
                            .and_then(|e| attr_value(e.value()));
                        if let Some(value) = value {
                            spec.attributes.insert(attr_name.to_string(), value);
                        } else {
                            return Err(SpecError::InvalidConfig(format!(
                                "resource \"{}\": attribute \"{}\" has no value",
                                id, attr_name
                            )));
                        }
                    }
                }
            }
        }
    }

    Ok(spec)
}

fn attr_value(value: &KdlValue) -> Option<AttrValue> {
    if let Some(s) = value.as_string() {
        Some(AttrValue::String(s.to_string()))
    } else if let Some(n) = value.as_integer() {
        Some(AttrValue::Integer(n as i64))
    } else {
        value.as_bool().map(AttrValue::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"
        project "tracking"

        provider "gcp" {
            project "my-project"
            region "us-central1"
            zone "us-central1-a"
        }

        resource "tracking-db-instance" kind="database-instance" {
            tier "db-f1-micro"
            storage-gb 10
        }

        resource "tracking-db" kind="database" {
            depends-on "tracking-db-instance"
            instance "tracking-db-instance"
            name "mlflow"
        }

        resource "tracking-service" kind="deployed-service" {
            depends-on "tracking-db"
            image "gcr.io/my-project/tracking:latest"
            port 5000
            allow-unauthenticated #true
            env BACKEND_STORE_URI="postgresql://db" PORT="5000"
        }
    "#;

    #[test]
    fn test_parse_full_stack() {
        let desired = parse_stack_string(STACK, "fallback".to_string()).unwrap();

        assert_eq!(desired.project, "tracking");
        assert_eq!(desired.resources.len(), 3);

        let provider = desired.provider.as_ref().unwrap();
        assert_eq!(provider.name, "gcp");
        assert_eq!(provider.project.as_deref(), Some("my-project"));
        assert_eq!(provider.region.as_deref(), Some("us-central1"));
        assert_eq!(provider.config.get("zone").map(String::as_str), Some("us-central1-a"));
    }

    #[test]
    fn test_parse_resource_attributes() {
        let desired = parse_stack_string(STACK, "fallback".to_string()).unwrap();

        let instance = desired.get("tracking-db-instance").unwrap();
        assert_eq!(instance.kind, ResourceKind::DatabaseInstance);
        assert_eq!(instance.attr_str("tier"), Some("db-f1-micro"));
        assert_eq!(instance.attr_integer("storage-gb"), Some(10));

        let db = desired.get("tracking-db").unwrap();
        assert_eq!(db.depends_on, vec!["tracking-db-instance"]);
        assert_eq!(db.attr_str("name"), Some("mlflow"));
    }

    #[test]
    fn test_parse_env_properties() {
        let desired = parse_stack_string(STACK, "fallback".to_string()).unwrap();

        let service = desired.get("tracking-service").unwrap();
        assert_eq!(service.attr_integer("port"), Some(5000));
        assert_eq!(service.attr_bool("allow-unauthenticated"), Some(true));
        assert_eq!(
            service.attr_str("env.BACKEND_STORE_URI"),
            Some("postgresql://db")
        );
        assert_eq!(service.attr_str("env.PORT"), Some("5000"));
    }

    #[test]
    fn test_parse_missing_kind() {
        let kdl = r#"resource "db" { tier "small" }"#;
        let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
        assert!(matches!(err, SpecError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_unknown_kind() {
        let kdl = r#"resource "db" kind="server""#;
        let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
        match err {
            SpecError::UnknownKind(kind) => assert_eq!(kind, "server"),
            other => panic!("expected UnknownKind, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_dependency() {
        let kdl = r#"
            resource "db" kind="database" {
                depends-on "missing"
            }
        "#;
        let err = parse_stack_string(kdl, "test".to_string()).unwrap_err();
        assert!(matches!(err, SpecError::UnknownDependency { .. }));
    }

    #[test]
    fn test_default_project_name() {
        let kdl = r#"resource "bucket" kind="storage-bucket""#;
        let desired = parse_stack_string(kdl, "dirname".to_string()).unwrap();
        assert_eq!(desired.project, "dirname");
    }
}
