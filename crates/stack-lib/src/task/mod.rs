//! Task definitions and on-demand task composition
//!
//! `FargateTaskDefinition` is the building block for every task in the
//! stack. `TaskComposer` wraps it for standalone tasks that are never run
//! as a service and are only invoked on demand (e.g. from DAG steps).

mod definition;
mod logging;

pub use definition::{
    ContainerDefinition, FargateTaskDefinition, MountPoint, TaskDefinitionRef, Volume,
    EXECUTION_ROLE_POLICY,
};
pub use logging::LogSink;

use crate::error::ConfigurationError;
use crate::graph::{ImageAsset, Platform, Scope, Stack, Value};
use crate::models::OnDemandTaskSpec;
use crate::service::policies;
use tracing::info;

/// Network filesystem mounted into an on-demand task
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFilesystemMount {
    pub volume_name: String,
    pub file_system_id: Value,
    pub container_path: String,
}

pub struct TaskComposer;

impl TaskComposer {
    /// Declare a standalone task definition with a single container.
    ///
    /// A volume and its mount are only declared together, when a
    /// filesystem is given.
    pub fn compose(
        stack: &mut Stack,
        scope: &Scope,
        spec: &OnDemandTaskSpec,
        logging: &LogSink,
        filesystem: Option<&SharedFilesystemMount>,
    ) -> Result<TaskDefinitionRef, ConfigurationError> {
        let mut task = FargateTaskDefinition::new(
            scope.child("TaskDefinition"),
            spec.cpu_units,
            spec.memory_mib,
        )
        .family(&spec.family);

        let asset = stack.add_image_asset(ImageAsset::new(&spec.asset_dir, Platform::default()));
        let mut container =
            ContainerDefinition::new(&spec.container_name, asset.image_uri()).logging(logging);

        if let Some(fs) = filesystem {
            task.add_volume(Volume {
                name: fs.volume_name.clone(),
                file_system_id: fs.file_system_id.clone(),
            });
            task.grant_managed_policy(policies::EFS_CLIENT_READ_WRITE);
            container = container.mount(MountPoint {
                container_path: fs.container_path.clone(),
                source_volume: fs.volume_name.clone(),
                read_only: false,
            });
        }
        task.add_container(container);

        let task = task.declare(stack)?;
        info!(
            family = %task.family,
            task_definition = %task.resource.logical_id,
            shared_filesystem = filesystem.is_some(),
            "On-demand task declared"
        );
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{types, Environment};

    fn spec() -> OnDemandTaskSpec {
        OnDemandTaskSpec {
            family: "AirflowOnFargateSingleTask".to_string(),
            container_name: "SingleTaskContainer".to_string(),
            asset_dir: "./tasks/single_task".to_string(),
            cpu_units: 256,
            memory_mib: 512,
        }
    }

    fn compose(filesystem: Option<&SharedFilesystemMount>) -> (Stack, TaskDefinitionRef) {
        let mut stack = Stack::new("Test", Environment::default());
        let root = stack.scope();
        let logging = LogSink::declare(&mut stack, &root.child("Logs"), None, 30, "Tasks").unwrap();
        let task = TaskComposer::compose(
            &mut stack,
            &root.child("SingleTask"),
            &spec(),
            &logging,
            filesystem,
        )
        .unwrap();
        (stack, task)
    }

    #[test]
    fn test_volume_and_mount_share_name() {
        let fs = SharedFilesystemMount {
            volume_name: "AirflowSharedVolume".to_string(),
            file_system_id: Value::reference("FileSystem"),
            container_path: "/airflow-shared-volume".to_string(),
        };
        let (stack, task) = compose(Some(&fs));

        let json = stack
            .resource(&task.resource.logical_id)
            .unwrap()
            .property("Volumes")
            .unwrap()
            .to_json();
        assert_eq!(json[0]["Name"], "AirflowSharedVolume");
        assert_eq!(json[0]["EFSVolumeConfiguration"]["FilesystemId"]["Ref"], "FileSystem");

        let containers = stack
            .resource(&task.resource.logical_id)
            .unwrap()
            .property("ContainerDefinitions")
            .unwrap()
            .to_json();
        let mount = &containers[0]["MountPoints"][0];
        assert_eq!(mount["SourceVolume"], "AirflowSharedVolume");
        assert_eq!(mount["ContainerPath"], "/airflow-shared-volume");
        assert_eq!(mount["ReadOnly"], false);

        let role = stack.resource(&task.task_role.logical_id).unwrap();
        assert_eq!(
            role.property("ManagedPolicyArns"),
            Some(&Value::List(vec![Value::managed_policy_arn(
                policies::EFS_CLIENT_READ_WRITE
            )]))
        );
    }

    #[test]
    fn test_no_filesystem_means_no_volume_or_mount() {
        let (stack, task) = compose(None);
        let resource = stack.resource(&task.resource.logical_id).unwrap();
        assert!(resource.property("Volumes").is_none());

        let containers = resource.property("ContainerDefinitions").unwrap().to_json();
        assert!(containers[0].get("MountPoints").is_none());

        let role = stack.resource(&task.task_role.logical_id).unwrap();
        assert!(role.property("ManagedPolicyArns").is_none());
    }

    #[test]
    fn test_standalone_task_has_no_service() {
        let (stack, task) = compose(None);
        assert_eq!(stack.count_of_type(types::SERVICE), 0);
        assert_eq!(stack.count_of_type(types::LOAD_BALANCER), 0);
        assert_eq!(task.family, "AirflowOnFargateSingleTask");
        assert_eq!(stack.assets().count(), 1);
    }
}
