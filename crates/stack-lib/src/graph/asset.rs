//! Container image assets built from local directories

use super::value::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Repository every image asset is published into
pub const ASSET_REPOSITORY: &str = "container-assets";

/// Target platform of an image build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "linux/amd64")]
    LinuxAmd64,
    #[serde(rename = "linux/arm64")]
    LinuxArm64,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "linux/amd64",
            Platform::LinuxArm64 => "linux/arm64",
        }
    }
}

/// A docker build context the engine publishes before deploying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub directory: String,
    pub platform: Platform,
    pub fingerprint: String,
}

impl ImageAsset {
    pub fn new(directory: impl Into<String>, platform: Platform) -> Self {
        let directory = directory.into();
        let mut hasher = Sha256::new();
        hasher.update(directory.as_bytes());
        hasher.update([0u8]);
        hasher.update(platform.as_str().as_bytes());
        let fingerprint = hex::encode(hasher.finalize());

        Self {
            directory,
            platform,
            fingerprint,
        }
    }

    /// Image URI of the published asset in the account's registry
    pub fn image_uri(&self) -> Value {
        Value::Sub(format!(
            "${{AWS::AccountId}}.dkr.ecr.${{AWS::Region}}.${{AWS::URLSuffix}}/{}-${{AWS::AccountId}}-${{AWS::Region}}:{}",
            ASSET_REPOSITORY, self.fingerprint
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_depends_on_directory_and_platform() {
        let a = ImageAsset::new("./airflow", Platform::LinuxAmd64);
        let b = ImageAsset::new("./airflow", Platform::LinuxAmd64);
        let c = ImageAsset::new("./airflow", Platform::LinuxArm64);
        let d = ImageAsset::new("./tasks/single_task", Platform::LinuxAmd64);

        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_ne!(a.fingerprint, d.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_image_uri_uses_pseudo_parameters() {
        let asset = ImageAsset::new("./airflow", Platform::LinuxAmd64);
        match asset.image_uri() {
            Value::Sub(template) => {
                assert!(template.starts_with("${AWS::AccountId}.dkr.ecr.${AWS::Region}."));
                assert!(template.ends_with(&asset.fingerprint));
            }
            other => panic!("unexpected image uri {:?}", other),
        }
    }
}
