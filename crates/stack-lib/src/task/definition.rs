//! Fargate task definitions, their containers and IAM roles

use super::logging::LogSink;
use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::validate_fargate_size;
use indexmap::IndexMap;
use tracing::debug;

/// Managed policy the engine needs to pull images and write logs
pub const EXECUTION_ROLE_POLICY: &str = "service-role/AmazonECSTaskExecutionRolePolicy";

const TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Named volume backed by a network filesystem
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: String,
    pub file_system_id: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub container_path: String,
    pub source_volume: String,
    pub read_only: bool,
}

/// One container inside a task definition
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: Value,
    pub entry_point: Option<String>,
    pub environment: IndexMap<String, Value>,
    pub port_mappings: Vec<u16>,
    pub cpu_units: Option<u32>,
    pub memory_mib: Option<u32>,
    /// Soft memory limit; the container may grow into free task memory
    pub memory_reservation_mib: Option<u32>,
    pub logging: Option<LogSink>,
    pub mount_points: Vec<MountPoint>,
}

impl ContainerDefinition {
    pub fn new(name: impl Into<String>, image: Value) -> Self {
        Self {
            name: name.into(),
            image,
            entry_point: None,
            environment: IndexMap::new(),
            port_mappings: Vec::new(),
            cpu_units: None,
            memory_mib: None,
            memory_reservation_mib: None,
            logging: None,
            mount_points: Vec::new(),
        }
    }

    pub fn entry_point(mut self, path: impl Into<String>) -> Self {
        self.entry_point = Some(path.into());
        self
    }

    pub fn environment(mut self, environment: IndexMap<String, Value>) -> Self {
        self.environment = environment;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port_mappings.push(port);
        self
    }

    pub fn resources(mut self, cpu_units: u32, memory_mib: u32) -> Self {
        self.cpu_units = Some(cpu_units);
        self.memory_mib = Some(memory_mib);
        self
    }

    pub fn memory_reservation(mut self, memory_mib: u32) -> Self {
        self.memory_reservation_mib = Some(memory_mib);
        self
    }

    /// Memory this container holds back from the task, hard or soft
    fn reserved_memory(&self) -> Option<u32> {
        self.memory_mib.or(self.memory_reservation_mib)
    }

    pub fn logging(mut self, sink: &LogSink) -> Self {
        self.logging = Some(sink.clone());
        self
    }

    pub fn mount(mut self, mount: MountPoint) -> Self {
        self.mount_points.push(mount);
        self
    }

    fn to_value(&self) -> Value {
        let mut entries: Vec<(&str, Value)> = vec![
            ("Name", Value::str(&self.name)),
            ("Image", self.image.clone()),
            ("Essential", Value::Bool(true)),
        ];
        if let Some(entry_point) = &self.entry_point {
            entries.push(("EntryPoint", Value::List(vec![Value::str(entry_point)])));
        }
        if !self.environment.is_empty() {
            let env = self
                .environment
                .iter()
                .map(|(name, value)| {
                    Value::map([("Name", Value::str(name)), ("Value", value.clone())])
                })
                .collect::<Vec<_>>();
            entries.push(("Environment", Value::List(env)));
        }
        if !self.port_mappings.is_empty() {
            let ports = self
                .port_mappings
                .iter()
                .map(|port| {
                    Value::map([
                        ("ContainerPort", Value::from(*port)),
                        ("Protocol", Value::str("tcp")),
                    ])
                })
                .collect::<Vec<_>>();
            entries.push(("PortMappings", Value::List(ports)));
        }
        if let Some(cpu) = self.cpu_units {
            entries.push(("Cpu", Value::from(cpu)));
        }
        if let Some(memory) = self.memory_mib {
            entries.push(("Memory", Value::from(memory)));
        }
        if let Some(reservation) = self.memory_reservation_mib {
            entries.push(("MemoryReservation", Value::from(reservation)));
        }
        if let Some(sink) = &self.logging {
            entries.push(("LogConfiguration", sink.log_configuration()));
        }
        if !self.mount_points.is_empty() {
            let mounts = self
                .mount_points
                .iter()
                .map(|m| {
                    Value::map([
                        ("ContainerPath", Value::str(&m.container_path)),
                        ("SourceVolume", Value::str(&m.source_volume)),
                        ("ReadOnly", Value::Bool(m.read_only)),
                    ])
                })
                .collect::<Vec<_>>();
            entries.push(("MountPoints", Value::List(mounts)));
        }
        Value::map(entries)
    }
}

/// A Fargate task definition being assembled
#[derive(Debug, Clone)]
pub struct FargateTaskDefinition {
    scope: Scope,
    family: Option<String>,
    cpu_units: u32,
    memory_mib: u32,
    containers: Vec<ContainerDefinition>,
    volumes: Vec<Volume>,
    task_role_policies: Vec<String>,
}

impl FargateTaskDefinition {
    pub fn new(scope: Scope, cpu_units: u32, memory_mib: u32) -> Self {
        Self {
            scope,
            family: None,
            cpu_units,
            memory_mib,
            containers: Vec::new(),
            volumes: Vec::new(),
            task_role_policies: Vec::new(),
        }
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn add_container(&mut self, container: ContainerDefinition) {
        self.containers.push(container);
    }

    pub fn add_volume(&mut self, volume: Volume) {
        self.volumes.push(volume);
    }

    /// Attach an AWS managed policy to the task role
    pub fn grant_managed_policy(&mut self, policy: impl Into<String>) {
        let policy = policy.into();
        if !self.task_role_policies.contains(&policy) {
            self.task_role_policies.push(policy);
        }
    }

    pub fn containers(&self) -> &[ContainerDefinition] {
        &self.containers
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let task = self.scope.path();
        validate_fargate_size(&task, self.cpu_units, self.memory_mib)?;

        let cpu: u64 = self
            .containers
            .iter()
            .filter_map(|c| c.cpu_units)
            .map(u64::from)
            .sum();
        if cpu > u64::from(self.cpu_units) {
            return Err(ConfigurationError::TaskOvercommitted {
                task,
                resource: "cpu units",
                requested: cpu,
                available: self.cpu_units,
            });
        }
        let memory: u64 = self
            .containers
            .iter()
            .filter_map(ContainerDefinition::reserved_memory)
            .map(u64::from)
            .sum();
        if memory > u64::from(self.memory_mib) {
            return Err(ConfigurationError::TaskOvercommitted {
                task,
                resource: "MiB",
                requested: memory,
                available: self.memory_mib,
            });
        }

        for mount in self.containers.iter().flat_map(|c| &c.mount_points) {
            if !self.volumes.iter().any(|v| v.name == mount.source_volume) {
                return Err(ConfigurationError::UnknownVolume {
                    task,
                    volume: mount.source_volume.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validate and declare the task definition and its two roles.
    pub fn declare(self, stack: &mut Stack) -> Result<TaskDefinitionRef, ConfigurationError> {
        self.validate()?;

        let mut task_role = Resource::new(types::ROLE)
            .with("AssumeRolePolicyDocument", assume_role_policy(TASKS_PRINCIPAL));
        for policy in &self.task_role_policies {
            task_role.push_unique("ManagedPolicyArns", Value::managed_policy_arn(policy));
        }
        let task_role = stack.add(&self.scope.child("TaskRole"), task_role)?;

        let execution_role = stack.add(
            &self.scope.child("ExecutionRole"),
            Resource::new(types::ROLE)
                .with("AssumeRolePolicyDocument", assume_role_policy(TASKS_PRINCIPAL))
                .with(
                    "ManagedPolicyArns",
                    vec![Value::managed_policy_arn(EXECUTION_ROLE_POLICY)],
                ),
        )?;

        let family = self
            .family
            .clone()
            .unwrap_or_else(|| self.scope.logical_id());

        let mut resource = Resource::new(types::TASK_DEFINITION)
            .with("Family", family.as_str())
            .with("Cpu", self.cpu_units.to_string())
            .with("Memory", self.memory_mib.to_string())
            .with("NetworkMode", "awsvpc")
            .with("RequiresCompatibilities", vec![Value::str("FARGATE")])
            .with("TaskRoleArn", task_role.att("Arn"))
            .with("ExecutionRoleArn", execution_role.att("Arn"))
            .with(
                "ContainerDefinitions",
                self.containers
                    .iter()
                    .map(ContainerDefinition::to_value)
                    .collect::<Vec<_>>(),
            );
        if !self.volumes.is_empty() {
            let volumes = self
                .volumes
                .iter()
                .map(|v| {
                    Value::map([
                        ("Name", Value::str(&v.name)),
                        (
                            "EFSVolumeConfiguration",
                            Value::map([("FilesystemId", v.file_system_id.clone())]),
                        ),
                    ])
                })
                .collect::<Vec<_>>();
            resource = resource.with("Volumes", volumes);
        }
        let resource = stack.add(&self.scope, resource)?;

        debug!(
            task_definition = %resource.logical_id,
            family = %family,
            containers = self.containers.len(),
            volumes = self.volumes.len(),
            "Task definition declared"
        );

        Ok(TaskDefinitionRef {
            resource,
            task_role,
            execution_role,
            family,
            containers: self
                .containers
                .iter()
                .map(|c| (c.name.clone(), c.port_mappings.first().copied()))
                .collect(),
        })
    }
}

/// A declared task definition
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinitionRef {
    pub resource: ResourceRef,
    pub task_role: ResourceRef,
    pub execution_role: ResourceRef,
    pub family: String,
    /// Container names with their first mapped port
    pub containers: Vec<(String, Option<u16>)>,
}

impl TaskDefinitionRef {
    /// Attach an AWS managed policy to the already declared task role.
    pub fn grant_managed_policy(
        &self,
        stack: &mut Stack,
        policy: &str,
    ) -> Result<(), ConfigurationError> {
        stack
            .resource_mut(&self.task_role.logical_id)?
            .push_unique("ManagedPolicyArns", Value::managed_policy_arn(policy));
        Ok(())
    }

    /// First container exposing a port, used as the load balancer target
    pub fn primary_port(&self) -> Option<(&str, u16)> {
        self.containers
            .iter()
            .find_map(|(name, port)| port.map(|p| (name.as_str(), p)))
    }
}

fn assume_role_policy(service: &str) -> Value {
    Value::map([
        ("Version", Value::str("2012-10-17")),
        (
            "Statement",
            Value::List(vec![Value::map([
                ("Action", Value::str("sts:AssumeRole")),
                ("Effect", Value::str("Allow")),
                ("Principal", Value::map([("Service", Value::str(service))])),
            ])]),
        ),
    ])
}
