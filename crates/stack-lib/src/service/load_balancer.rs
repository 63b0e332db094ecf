//! Internet-facing network load balancer in front of a service

use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use crate::network::NetworkDescriptor;

pub const LISTENER_PORT: u16 = 80;
pub const HEALTH_CHECK_THRESHOLD: u32 = 2;
pub const DEREGISTRATION_DELAY_SECS: u32 = 60;

/// Load balancer, listener and target group of a public service
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancedEndpoint {
    pub load_balancer: ResourceRef,
    pub listener: ResourceRef,
    pub target_group: ResourceRef,
    /// Logical id of the `LoadBalancerDNSName` output
    pub dns_output: String,
}

impl LoadBalancedEndpoint {
    pub fn dns_name(&self) -> Value {
        self.load_balancer.att("DNSName")
    }

    /// Entry for the service's `LoadBalancers` property
    pub fn target(&self, container_name: &str, container_port: u16) -> Value {
        Value::map([
            ("ContainerName", Value::str(container_name)),
            ("ContainerPort", Value::from(container_port)),
            ("TargetGroupArn", self.target_group.id()),
        ])
    }
}

/// Declare the load balancer chain and the DNS name output.
pub fn attach(
    stack: &mut Stack,
    scope: &Scope,
    network: &NetworkDescriptor,
) -> Result<LoadBalancedEndpoint, ConfigurationError> {
    if network.public_subnet_ids.is_empty() {
        return Err(ConfigurationError::InvalidNetwork(
            "an internet-facing load balancer needs public subnets".to_string(),
        ));
    }

    let load_balancer = stack.add(
        &scope.child("LoadBalancer"),
        Resource::new(types::LOAD_BALANCER)
            .with("Type", "network")
            .with("Scheme", "internet-facing")
            .with("Subnets", network.public_subnet_ids.clone())
            .with(
                "LoadBalancerAttributes",
                vec![Value::map([
                    ("Key", Value::str("load_balancing.cross_zone.enabled")),
                    ("Value", Value::str("true")),
                ])],
            ),
    )?;

    let target_group = stack.add(
        &scope.child("TargetGroup"),
        Resource::new(types::TARGET_GROUP)
            .with("Port", LISTENER_PORT)
            .with("Protocol", "TCP")
            .with("TargetType", "ip")
            .with("VpcId", network.vpc_id.clone())
            .with("HealthyThresholdCount", HEALTH_CHECK_THRESHOLD)
            .with("UnhealthyThresholdCount", HEALTH_CHECK_THRESHOLD)
            .with(
                "TargetGroupAttributes",
                vec![Value::map([
                    ("Key", Value::str("deregistration_delay.timeout_seconds")),
                    ("Value", Value::str(DEREGISTRATION_DELAY_SECS.to_string())),
                ])],
            ),
    )?;

    let listener = stack.add(
        &scope.child("Listener"),
        Resource::new(types::LISTENER)
            .with("LoadBalancerArn", load_balancer.id())
            .with("Port", LISTENER_PORT)
            .with("Protocol", "TCP")
            .with(
                "DefaultActions",
                vec![Value::map([
                    ("Type", Value::str("forward")),
                    ("TargetGroupArn", target_group.id()),
                ])],
            ),
    )?;

    let dns_output = stack.add_output(
        &scope.child("LoadBalancerDNSName"),
        load_balancer.att("DNSName"),
        Some(format!("Public DNS name of {}", scope.path())),
    )?;

    Ok(LoadBalancedEndpoint {
        load_balancer,
        listener,
        target_group,
        dns_output,
    })
}
