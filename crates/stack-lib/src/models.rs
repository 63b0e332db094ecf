//! Configuration records for the Airflow stack
//!
//! Pure data: container shapes, task sizing, autoscaling targets and
//! database parameters. Every record carries the defaults the stack ships
//! with and a `validate` method that is run before anything is declared.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Retention periods CloudWatch Logs accepts, in days.
pub const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Role a container plays inside the Airflow deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRole {
    Web,
    Scheduler,
    Worker,
}

impl ContainerRole {
    /// Every role, in declaration order.
    pub const ALL: [ContainerRole; 3] = [
        ContainerRole::Web,
        ContainerRole::Scheduler,
        ContainerRole::Worker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerRole::Web => "web",
            ContainerRole::Scheduler => "scheduler",
            ContainerRole::Worker => "worker",
        }
    }
}

/// Shape of a single application container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub listen_port: u16,
    pub entrypoint_path: String,
    #[serde(default = "default_container_cpu")]
    pub cpu_units: u32,
    #[serde(default = "default_container_memory")]
    pub memory_mib: u32,
}

fn default_container_cpu() -> u32 {
    256
}

fn default_container_memory() -> u32 {
    512
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        listen_port: u16,
        entrypoint_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            listen_port,
            entrypoint_path: entrypoint_path.into(),
            cpu_units: default_container_cpu(),
            memory_mib: default_container_memory(),
        }
    }

    pub fn with_resources(mut self, cpu_units: u32, memory_mib: u32) -> Self {
        self.cpu_units = cpu_units;
        self.memory_mib = memory_mib;
        self
    }

    pub fn webserver() -> Self {
        Self::new("webserver", 8080, "/webserver_entry.sh")
    }

    pub fn scheduler() -> Self {
        Self::new("scheduler", 8081, "/scheduler_entry.sh")
    }

    pub fn worker() -> Self {
        Self::new("worker", 8082, "/worker_entry.sh")
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                context: "container".to_string(),
            });
        }
        if self.listen_port == 0 {
            return Err(ConfigurationError::InvalidPort {
                context: format!("container '{}'", self.name),
            });
        }
        Ok(())
    }
}

/// Sizing and layout of the Airflow application tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationTaskConfig {
    pub cpu_units: u32,
    pub memory_mib: u32,
    pub web: ContainerSpec,
    pub scheduler: ContainerSpec,
    pub worker: ContainerSpec,
    pub log_retention_days: u32,
    /// Give the worker its own task definition and autoscaled service
    pub use_dedicated_worker_pool: bool,
}

impl Default for ApplicationTaskConfig {
    fn default() -> Self {
        Self {
            cpu_units: 2048,
            memory_mib: 4096,
            web: ContainerSpec::webserver(),
            scheduler: ContainerSpec::scheduler(),
            worker: ContainerSpec::worker(),
            log_retention_days: 30,
            use_dedicated_worker_pool: false,
        }
    }
}

impl ApplicationTaskConfig {
    pub fn container(&self, role: ContainerRole) -> &ContainerSpec {
        match role {
            ContainerRole::Web => &self.web,
            ContainerRole::Scheduler => &self.scheduler,
            ContainerRole::Worker => &self.worker,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_fargate_size("application task", self.cpu_units, self.memory_mib)?;
        validate_log_retention(self.log_retention_days)?;
        for role in ContainerRole::ALL {
            let spec = self.container(role);
            spec.validate()?;
            let task = format!("application task (container '{}')", spec.name);
            if spec.cpu_units > self.cpu_units {
                return Err(ConfigurationError::TaskOvercommitted {
                    task,
                    resource: "cpu units",
                    requested: u64::from(spec.cpu_units),
                    available: self.cpu_units,
                });
            }
            if spec.memory_mib > self.memory_mib {
                return Err(ConfigurationError::TaskOvercommitted {
                    task,
                    resource: "MiB",
                    requested: u64::from(spec.memory_mib),
                    available: self.memory_mib,
                });
            }
        }
        Ok(())
    }
}

/// Horizontal autoscaling bounds and target-tracking thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalingPolicy {
    pub min_capacity: u32,
    pub max_capacity: u32,
    #[serde(default)]
    pub target_cpu_percent: Option<u32>,
    #[serde(default)]
    pub target_memory_percent: Option<u32>,
}

impl Default for AutoscalingPolicy {
    fn default() -> Self {
        Self {
            min_capacity: 1,
            max_capacity: 5,
            target_cpu_percent: Some(70),
            target_memory_percent: Some(80),
        }
    }
}

impl AutoscalingPolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_capacity == 0 || self.min_capacity > self.max_capacity {
            return Err(ConfigurationError::InvalidCapacityRange {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }
        for (metric, target) in [
            ("cpu", self.target_cpu_percent),
            ("memory", self.target_memory_percent),
        ] {
            if let Some(value) = target {
                if !(1..=100).contains(&value) {
                    return Err(ConfigurationError::TargetOutOfRange { metric, value });
                }
            }
        }
        Ok(())
    }
}

/// Managed Postgres parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_name")]
    pub master_username: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Instance class without the `db.` prefix, e.g. `t3.small`
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    #[serde(default = "default_storage_gib")]
    pub storage_gib: u32,
    #[serde(default = "default_backup_retention")]
    pub backup_retention_days: u32,
}

fn default_db_name() -> String {
    "airflow".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_instance_class() -> String {
    "t3.small".to_string()
}

fn default_storage_gib() -> u32 {
    25
}

fn default_backup_retention() -> u32 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_db_name(),
            master_username: default_db_name(),
            port: default_db_port(),
            instance_class: default_instance_class(),
            storage_gib: default_storage_gib(),
            backup_retention_days: default_backup_retention(),
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                context: "database".to_string(),
            });
        }
        if self.master_username.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                context: "database master user".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigurationError::InvalidPort {
                context: format!("database '{}'", self.name),
            });
        }
        match self.instance_class.split_once('.') {
            Some((family, size)) if !family.is_empty() && !size.is_empty() => Ok(()),
            _ => Err(ConfigurationError::InvalidInstanceClass(
                self.instance_class.clone(),
            )),
        }
    }

    /// RDS instance class as the engine expects it.
    pub fn db_instance_class(&self) -> String {
        format!("db.{}", self.instance_class)
    }
}

/// Virtual network layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cidr: String,
    pub max_azs: u8,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
        }
    }
}

/// One on-demand task definition invoked from DAG steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnDemandTaskSpec {
    pub family: String,
    pub container_name: String,
    pub asset_dir: String,
    pub cpu_units: u32,
    pub memory_mib: u32,
}

/// On-demand DAG tasks sharing one network filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DagTasksConfig {
    pub log_group_name: String,
    pub stream_prefix: String,
    pub log_retention_days: u32,
    pub volume_name: String,
    pub container_path: String,
    pub tasks: Vec<OnDemandTaskSpec>,
}

impl Default for DagTasksConfig {
    fn default() -> Self {
        Self {
            log_group_name: "AirflowOnFargateDagTaskLogGroup".to_string(),
            stream_prefix: "AirflowOnFargateDagTaskLogging".to_string(),
            log_retention_days: 30,
            volume_name: "AirflowSharedVolume".to_string(),
            container_path: "/airflow-shared-volume".to_string(),
            tasks: vec![
                OnDemandTaskSpec {
                    family: "AirflowOnFargateCombinedTask".to_string(),
                    container_name: "MultiTaskContainer".to_string(),
                    asset_dir: "./tasks/multi_task".to_string(),
                    cpu_units: 512,
                    memory_mib: 1024,
                },
                OnDemandTaskSpec {
                    family: "AirflowOnFargateSingleTask".to_string(),
                    container_name: "SingleTaskContainer".to_string(),
                    asset_dir: "./tasks/single_task".to_string(),
                    cpu_units: 256,
                    memory_mib: 512,
                },
            ],
        }
    }
}

impl DagTasksConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_log_retention(self.log_retention_days)?;
        if self.volume_name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName {
                context: "shared volume".to_string(),
            });
        }
        for task in &self.tasks {
            if task.family.trim().is_empty() || task.container_name.trim().is_empty() {
                return Err(ConfigurationError::EmptyName {
                    context: "on-demand task".to_string(),
                });
            }
            validate_fargate_size(&task.family, task.cpu_units, task.memory_mib)?;
        }
        Ok(())
    }
}

pub fn validate_log_retention(days: u32) -> Result<(), ConfigurationError> {
    if LOG_RETENTION_DAYS.contains(&days) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidLogRetention { days })
    }
}

/// Check a task-level cpu/memory pair against the Fargate size table
pub fn validate_fargate_size(context: &str, cpu: u32, memory: u32) -> Result<(), ConfigurationError> {
    let valid = match cpu {
        256 => matches!(memory, 512 | 1024 | 2048),
        512 => (1024..=4096).contains(&memory) && memory % 1024 == 0,
        1024 => (2048..=8192).contains(&memory) && memory % 1024 == 0,
        2048 => (4096..=16384).contains(&memory) && memory % 1024 == 0,
        4096 => (8192..=30720).contains(&memory) && memory % 1024 == 0,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidFargateSize {
            context: context.to_string(),
            cpu,
            memory,
        })
    }
}
