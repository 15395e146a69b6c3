use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("stack.kdl");
        fs::write(&path, content).unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn state_dir(&self) -> PathBuf {
        self.root.path().join(".groundwork")
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }
}

pub const TRACKING_STACK: &str = r#"
project "tracking"

provider "gcp" {
    project "my-project"
    region "us-central1"
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

resource "artifact-bucket" kind="storage-bucket" {
    lifecycle-days 90
}

resource "tracking-service" kind="deployed-service" {
    depends-on "tracking-db" "artifact-bucket"
    image "gcr.io/my-project/tracking:latest"
    port 5000
    env BACKEND_STORE_URI="postgresql://mlflow@host/mlflow" ARTIFACT_ROOT="gs://artifact-bucket"
}
"#;
