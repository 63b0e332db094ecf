//! Stack settings
//!
//! Defaults describe the stack as shipped. An optional settings file and
//! `AOF_*` environment variables (nested keys separated by `__`) override
//! them. The target account and region come from `CDK_DEFAULT_ACCOUNT` and
//! `CDK_DEFAULT_REGION` and may be absent.

use crate::error::ConfigurationError;
use crate::graph::Environment;
use crate::models::{
    ApplicationTaskConfig, AutoscalingPolicy, DagTasksConfig, DatabaseConfig, NetworkConfig,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "AOF";
pub const DEPLOYMENT_ENV_PREFIX: &str = "CDK_DEFAULT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    pub stack_name: String,
    /// Build context of the Airflow image
    pub image_directory: String,
    pub tags: IndexMap<String, String>,
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub application: ApplicationTaskConfig,
    pub worker_autoscaling: AutoscalingPolicy,
    pub dag_tasks: DagTasksConfig,
    #[serde(skip)]
    pub environment: Environment,
}

impl Default for StackSettings {
    fn default() -> Self {
        let mut tags = IndexMap::new();
        tags.insert("Stack".to_string(), "AirflowOnFargate".to_string());

        Self {
            stack_name: "AirflowOnFargateStack".to_string(),
            image_directory: "./airflow".to_string(),
            tags,
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
            application: ApplicationTaskConfig::default(),
            worker_autoscaling: AutoscalingPolicy::default(),
            dag_tasks: DagTasksConfig::default(),
            environment: Environment::default(),
        }
    }
}

impl StackSettings {
    /// Load settings from an optional file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: StackSettings = config.try_deserialize()?;
        settings.environment = deployment_environment();
        Ok(settings)
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Check every record before anything is declared
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.stack_name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                context: "stack".to_string(),
            });
        }
        self.application.validate()?;
        self.database.validate()?;
        self.dag_tasks.validate()?;
        if self.application.use_dedicated_worker_pool {
            self.worker_autoscaling.validate()?;
        }
        Ok(())
    }
}

/// Account and region read once from the process environment.
///
/// Missing values stay unset so the engine applies its own defaults.
pub fn deployment_environment() -> Environment {
    config::Config::builder()
        .add_source(config::Environment::with_prefix(DEPLOYMENT_ENV_PREFIX))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_default()
}
