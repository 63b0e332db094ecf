//! Long-running Fargate services
//!
//! A service runs a task definition on the cluster and is either exposed
//! through a network load balancer or, for worker pools, autoscaled on
//! utilization. The two paths are mutually exclusive.

mod autoscaling;
mod load_balancer;
pub mod policies;

pub use autoscaling::{ScalingAttachment, ScalingMetric, SCALING_COOLDOWN_SECS};
pub use load_balancer::{
    LoadBalancedEndpoint, DEREGISTRATION_DELAY_SECS, HEALTH_CHECK_THRESHOLD, LISTENER_PORT,
};

use crate::cluster::ClusterRef;
use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::AutoscalingPolicy;
use crate::network::NetworkDescriptor;
use crate::task::TaskDefinitionRef;
use tracing::info;

pub const FARGATE_PLATFORM_VERSION: &str = "1.4.0";

/// How a service is reached or sized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    /// Request-facing, behind a public load balancer
    Public,
    /// Worker pool, scaled on utilization
    Worker(AutoscalingPolicy),
}

impl ServiceKind {
    pub fn is_worker(&self) -> bool {
        matches!(self, ServiceKind::Worker(_))
    }
}

/// A declared service and whatever is attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedService {
    pub service: ResourceRef,
    pub endpoint: Option<LoadBalancedEndpoint>,
    pub scaling: Option<ScalingAttachment>,
}

pub struct ServiceComposer;

impl ServiceComposer {
    pub fn compose(
        stack: &mut Stack,
        scope: &Scope,
        cluster: &ClusterRef,
        task: &TaskDefinitionRef,
        network: &NetworkDescriptor,
        kind: &ServiceKind,
    ) -> Result<ComposedService, ConfigurationError> {
        network.validate()?;
        let target = match kind {
            ServiceKind::Worker(policy) => {
                policy.validate()?;
                None
            }
            ServiceKind::Public => {
                if network.public_subnet_ids.is_empty() {
                    return Err(ConfigurationError::InvalidNetwork(
                        "an internet-facing load balancer needs public subnets".to_string(),
                    ));
                }
                let target = task.primary_port().ok_or_else(|| {
                    ConfigurationError::InvalidNetwork(format!(
                        "{} has no container port for the load balancer",
                        task.family
                    ))
                })?;
                Some(target)
            }
        };

        for policy in policies::SERVICE_TASK_POLICIES {
            task.grant_managed_policy(stack, policy)?;
        }
        network.allow_from_any_ipv4(stack, 0, u16::MAX)?;

        let endpoint = match kind {
            ServiceKind::Public => Some(load_balancer::attach(stack, scope, network)?),
            ServiceKind::Worker(_) => None,
        };

        let mut service = Resource::new(types::SERVICE)
            .with("Cluster", cluster.name.clone())
            .with("TaskDefinition", task.resource.id())
            .with("LaunchType", "FARGATE")
            .with("PlatformVersion", FARGATE_PLATFORM_VERSION)
            .with("DesiredCount", 1u32)
            .with("EnableECSManagedTags", false)
            .with(
                "DeploymentConfiguration",
                Value::map([
                    ("MaximumPercent", Value::from(200u32)),
                    ("MinimumHealthyPercent", Value::from(50u32)),
                ]),
            )
            .with(
                "NetworkConfiguration",
                Value::map([(
                    "AwsvpcConfiguration",
                    Value::map([
                        ("AssignPublicIp", Value::str("DISABLED")),
                        (
                            "SecurityGroups",
                            Value::List(vec![network.security_group_id.clone()]),
                        ),
                        ("Subnets", Value::List(network.private_subnet_ids.clone())),
                    ]),
                )]),
            );

        if let (Some(endpoint), Some((container, port))) = (&endpoint, target) {
            service = service
                .with("LoadBalancers", vec![endpoint.target(container, port)])
                .with("HealthCheckGracePeriodSeconds", 60u32)
                .depends_on(&endpoint.listener.logical_id);
        }
        let service = stack.add(&scope.child("Service"), service)?;

        let scaling = match kind {
            ServiceKind::Worker(policy) => Some(autoscaling::configure(
                stack, scope, cluster, &service, policy,
            )?),
            ServiceKind::Public => None,
        };

        info!(
            service = %service.logical_id,
            task_definition = %task.resource.logical_id,
            worker = kind.is_worker(),
            scaling_policies = scaling.as_ref().map(|s| s.policy_count()).unwrap_or(0),
            "Service declared"
        );

        Ok(ComposedService {
            service,
            endpoint,
            scaling,
        })
    }
}
