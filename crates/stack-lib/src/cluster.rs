//! ECS cluster every service and task runs in

use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use tracing::info;

/// What dependents need to know about the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRef {
    pub resource: ResourceRef,
    /// Cluster name (`Ref` of the cluster)
    pub name: Value,
    pub arn: Value,
}

pub struct ComputeCluster;

impl ComputeCluster {
    pub fn build(stack: &mut Stack, scope: &Scope) -> Result<ClusterRef, ConfigurationError> {
        let resource = stack.add(scope, Resource::new(types::CLUSTER))?;
        info!(cluster = %resource.logical_id, "Cluster declared");

        Ok(ClusterRef {
            name: resource.id(),
            arn: resource.att("Arn"),
            resource,
        })
    }
}
