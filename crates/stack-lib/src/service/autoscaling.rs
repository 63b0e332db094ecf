//! Target-tracking autoscaling for worker services

use crate::cluster::ClusterRef;
use crate::error::ConfigurationError;
use crate::graph::{types, Pseudo, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::AutoscalingPolicy;

pub const SCALING_COOLDOWN_SECS: u32 = 60;

const SCALABLE_DIMENSION: &str = "ecs:service:DesiredCount";

const AUTOSCALING_ROLE_PATH: &str = "role/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService";

/// Utilization metric a policy tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMetric {
    Cpu,
    Memory,
}

impl ScalingMetric {
    fn construct_id(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "CpuScaling",
            ScalingMetric::Memory => "MemoryScaling",
        }
    }

    fn predefined_metric(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "ECSServiceAverageCPUUtilization",
            ScalingMetric::Memory => "ECSServiceAverageMemoryUtilization",
        }
    }
}

/// Scalable target and the independent policies attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingAttachment {
    pub target: ResourceRef,
    pub cpu_policy: Option<ResourceRef>,
    pub memory_policy: Option<ResourceRef>,
}

impl ScalingAttachment {
    pub fn policy_count(&self) -> usize {
        self.cpu_policy.iter().count() + self.memory_policy.iter().count()
    }
}

pub fn configure(
    stack: &mut Stack,
    scope: &Scope,
    cluster: &ClusterRef,
    service: &ResourceRef,
    policy: &AutoscalingPolicy,
) -> Result<ScalingAttachment, ConfigurationError> {
    policy.validate()?;

    let target_scope = scope.child("TaskCount").child("Target");
    let target = stack.add(
        &target_scope,
        Resource::new(types::SCALABLE_TARGET)
            .with("MinCapacity", policy.min_capacity)
            .with("MaxCapacity", policy.max_capacity)
            .with(
                "ResourceId",
                Value::join(
                    "/",
                    vec![
                        Value::str("service"),
                        cluster.name.clone(),
                        service.att("Name"),
                    ],
                ),
            )
            .with("ScalableDimension", SCALABLE_DIMENSION)
            .with("ServiceNamespace", "ecs")
            .with(
                "RoleARN",
                Value::join(
                    "",
                    vec![
                        Value::str("arn:"),
                        Value::pseudo(Pseudo::Partition),
                        Value::str(":iam::"),
                        Value::pseudo(Pseudo::AccountId),
                        Value::str(format!(":{}", AUTOSCALING_ROLE_PATH)),
                    ],
                ),
            ),
    )?;

    let mut track = |metric: ScalingMetric, percent: Option<u32>| match percent {
        Some(percent) => target_tracking(stack, &target_scope, &target, metric, percent).map(Some),
        None => Ok(None),
    };
    let cpu_policy = track(ScalingMetric::Cpu, policy.target_cpu_percent)?;
    let memory_policy = track(ScalingMetric::Memory, policy.target_memory_percent)?;

    Ok(ScalingAttachment {
        target,
        cpu_policy,
        memory_policy,
    })
}

fn target_tracking(
    stack: &mut Stack,
    scope: &Scope,
    target: &ResourceRef,
    metric: ScalingMetric,
    percent: u32,
) -> Result<ResourceRef, ConfigurationError> {
    let policy_scope = scope.child(metric.construct_id());
    stack.add(
        &policy_scope,
        Resource::new(types::SCALING_POLICY)
            .with("PolicyName", policy_scope.logical_id())
            .with("PolicyType", "TargetTrackingScaling")
            .with("ScalingTargetId", target.id())
            .with(
                "TargetTrackingScalingPolicyConfiguration",
                Value::map([
                    (
                        "PredefinedMetricSpecification",
                        Value::map([(
                            "PredefinedMetricType",
                            Value::str(metric.predefined_metric()),
                        )]),
                    ),
                    ("TargetValue", Value::from(percent)),
                    ("ScaleInCooldown", Value::from(SCALING_COOLDOWN_SECS)),
                    ("ScaleOutCooldown", Value::from(SCALING_COOLDOWN_SECS)),
                ]),
            ),
    )
}
