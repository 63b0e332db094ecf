//! On-demand tasks invoked from DAG steps, sharing one network filesystem

use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::DagTasksConfig;
use crate::network::NetworkDescriptor;
use crate::task::{LogSink, SharedFilesystemMount, TaskComposer, TaskDefinitionRef};

pub const NFS_PORT: u16 = 2049;

#[derive(Debug, Clone)]
pub struct DagTasks {
    pub file_system: ResourceRef,
    pub mount_targets: Vec<ResourceRef>,
    pub tasks: Vec<TaskDefinitionRef>,
}

pub fn build(
    stack: &mut Stack,
    scope: &Scope,
    network: &NetworkDescriptor,
    config: &DagTasksConfig,
) -> Result<DagTasks, ConfigurationError> {
    let logging = LogSink::declare(
        stack,
        &scope.child(&config.log_group_name),
        Some(config.log_group_name.as_str()),
        config.log_retention_days,
        &config.stream_prefix,
    )?;

    let fs_scope = scope.child("AirflowOnFargateDagTaskFileSystem");
    let file_system = stack.add(
        &fs_scope,
        Resource::new(types::FILE_SYSTEM)
            .with("Encrypted", true)
            .with(
                "FileSystemTags",
                vec![Value::map([
                    ("Key", Value::str("Name")),
                    ("Value", Value::str(fs_scope.path())),
                ])],
            ),
    )?;

    let mut mount_targets = Vec::with_capacity(network.private_subnet_ids.len());
    for (index, subnet) in network.private_subnet_ids.iter().enumerate() {
        let target = stack.add(
            &fs_scope.child(format!("EfsMountTarget{}", index + 1)),
            Resource::new(types::MOUNT_TARGET)
                .with("FileSystemId", file_system.id())
                .with("SubnetId", subnet.clone())
                .with(
                    "SecurityGroups",
                    vec![network.security_group_id.clone()],
                ),
        )?;
        mount_targets.push(target);
    }
    network.allow_internally(stack, NFS_PORT)?;

    let mount = SharedFilesystemMount {
        volume_name: config.volume_name.clone(),
        file_system_id: file_system.id(),
        container_path: config.container_path.clone(),
    };
    let tasks = config
        .tasks
        .iter()
        .map(|spec| {
            TaskComposer::compose(stack, &scope.child(&spec.family), spec, &logging, Some(&mount))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DagTasks {
        file_system,
        mount_targets,
        tasks,
    })
}
