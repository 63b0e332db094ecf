//! Hand-off to the provisioning engine
//!
//! The engine receives a finished stack and converges real infrastructure
//! towards it. This crate never talks to a cloud API itself: the in-tree
//! engine writes a cloud assembly directory that external tooling deploys.

use crate::error::ProvisioningFailure;
use crate::graph::{Stack, ASSET_REPOSITORY};
use crate::observability::StructuredLogger;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use async_trait::async_trait;

/// Default output directory of the cloud assembly
pub const DEFAULT_OUTPUT_DIR: &str = "cdk.out";

pub const MANIFEST_FILE: &str = "manifest.json";

/// Cloud assembly schema version written into the manifest
pub const ASSEMBLY_VERSION: &str = "36.0.0";

/// What the engine reports back after accepting a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningReceipt {
    pub stack_name: String,
    pub environment: String,
    /// Where the engine put the stack
    pub location: String,
    pub files: Vec<PathBuf>,
    pub created_at: i64,
}

/// Converges declared state into real resources
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Accept a stack. Failures are surfaced verbatim and never retried.
    async fn provision(&self, stack: &Stack) -> Result<ProvisioningReceipt, ProvisioningFailure>;
}

/// Writes the template, asset manifest and assembly manifest to disk
#[derive(Debug, Clone)]
pub struct AssemblyDirectory {
    root: PathBuf,
}

impl Default for AssemblyDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl AssemblyDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template_file(stack_name: &str) -> String {
        format!("{}.template.json", stack_name)
    }

    pub fn assets_file(stack_name: &str) -> String {
        format!("{}.assets.json", stack_name)
    }

    async fn write_json(&self, name: &str, value: &Json) -> Result<PathBuf, ProvisioningFailure> {
        let path = self.root.join(name);
        let body = serde_json::to_vec_pretty(value)?;
        fs::write(&path, body)
            .await
            .map_err(|source| ProvisioningFailure::Io {
                path: path.display().to_string(),
                source,
            })?;
        Ok(path)
    }
}

/// Asset manifest: one docker image per build context
pub fn asset_manifest(stack: &Stack) -> Json {
    let mut images = Map::new();
    for asset in stack.assets() {
        images.insert(
            asset.fingerprint.clone(),
            json!({
                "source": {
                    "directory": asset.directory,
                    "platform": asset.platform.as_str(),
                },
                "destinations": {
                    "current_account-current_region": {
                        "repositoryName": format!(
                            "{}-${{AWS::AccountId}}-${{AWS::Region}}",
                            ASSET_REPOSITORY
                        ),
                        "imageTag": asset.fingerprint,
                    }
                }
            }),
        );
    }
    json!({
        "version": ASSEMBLY_VERSION,
        "files": {},
        "dockerImages": images,
    })
}

/// Assembly manifest describing the single stack artifact
pub fn assembly_manifest(stack: &Stack, created_at: i64) -> Json {
    let outputs: Vec<&str> = stack.outputs().map(|(_, output)| output.name.as_str()).collect();
    let mut artifacts = Map::new();
    artifacts.insert(
        stack.name().to_string(),
        json!({
            "type": "aws:cloudformation:stack",
            "environment": stack.environment().uri(),
            "properties": {
                "templateFile": AssemblyDirectory::template_file(stack.name()),
            },
            "dependencies": [AssemblyDirectory::assets_file(stack.name())],
            "outputs": outputs,
        }),
    );
    artifacts.insert(
        AssemblyDirectory::assets_file(stack.name()),
        json!({
            "type": "cdk:asset-manifest",
            "properties": { "file": AssemblyDirectory::assets_file(stack.name()) },
        }),
    );
    json!({
        "version": ASSEMBLY_VERSION,
        "createdAt": created_at,
        "artifacts": artifacts,
    })
}

#[async_trait]
impl ProvisioningEngine for AssemblyDirectory {
    async fn provision(&self, stack: &Stack) -> Result<ProvisioningReceipt, ProvisioningFailure> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ProvisioningFailure::Io {
                path: self.root.display().to_string(),
                source,
            })?;

        let created_at = chrono::Utc::now().timestamp();
        let files = vec![
            self.write_json(&Self::template_file(stack.name()), &stack.synthesize())
                .await?,
            self.write_json(&Self::assets_file(stack.name()), &asset_manifest(stack))
                .await?,
            self.write_json(MANIFEST_FILE, &assembly_manifest(stack, created_at))
                .await?,
        ];

        StructuredLogger::new(stack.name()).log_assembly_written(&self.root, files.len());

        Ok(ProvisioningReceipt {
            stack_name: stack.name().to_string(),
            environment: stack.environment().uri(),
            location: self.root.display().to_string(),
            files,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Environment, ImageAsset, Platform, Resource, Value};
    use tempfile::TempDir;

    fn sample_stack() -> Stack {
        let mut stack = Stack::new("SampleStack", Environment::default());
        let root = stack.scope();
        let cluster = stack
            .add(&root.child("ECSCluster"), Resource::new("AWS::ECS::Cluster"))
            .unwrap();
        stack
            .add_output(&root.child("ClusterName"), cluster.id(), None)
            .unwrap();
        stack.add_image_asset(ImageAsset::new("./airflow", Platform::LinuxAmd64));
        stack
    }

    #[tokio::test]
    async fn test_writes_every_file() {
        let dir = TempDir::new().unwrap();
        let engine = AssemblyDirectory::new(dir.path().join("cdk.out"));
        let stack = sample_stack();

        let receipt = engine.provision(&stack).await.unwrap();
        assert_eq!(receipt.files.len(), 3);
        assert_eq!(receipt.environment, "aws://unknown-account/unknown-region");

        let template = fs::read_to_string(dir.path().join("cdk.out/SampleStack.template.json"))
            .await
            .unwrap();
        let template: Json = serde_json::from_str(&template).unwrap();
        assert_eq!(template["Resources"].as_object().unwrap().len(), stack.len());

        let manifest = fs::read_to_string(dir.path().join("cdk.out/manifest.json"))
            .await
            .unwrap();
        let manifest: Json = serde_json::from_str(&manifest).unwrap();
        assert_eq!(
            manifest["artifacts"]["SampleStack"]["outputs"],
            json!(["ClusterName"])
        );
    }

    #[tokio::test]
    async fn test_unwritable_root_is_io_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("occupied");
        fs::write(&blocker, "not a directory").await.unwrap();

        let engine = AssemblyDirectory::new(&blocker);
        let result = engine.provision(&sample_stack()).await;
        assert!(matches!(result, Err(ProvisioningFailure::Io { .. })));
    }

    #[test]
    fn test_asset_manifest_lists_build_contexts() {
        let stack = sample_stack();
        let manifest = asset_manifest(&stack);
        let images = manifest["dockerImages"].as_object().unwrap();
        assert_eq!(images.len(), 1);
        let (fingerprint, image) = images.iter().next().unwrap();
        assert_eq!(image["source"]["directory"], "./airflow");
        assert_eq!(image["source"]["platform"], "linux/amd64");
        assert_eq!(
            image["destinations"]["current_account-current_region"]["imageTag"],
            Value::str(fingerprint.clone()).to_json()
        );
    }
}
