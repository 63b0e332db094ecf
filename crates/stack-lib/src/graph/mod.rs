//! Declarative resource graph
//!
//! This module provides the in-memory model the rest of the crate builds
//! into. A `Stack` is an ordered set of resources keyed by logical id, plus
//! outputs, stack-wide tags and the container image assets the engine has
//! to publish before deploying. Constructs address resources through
//! `Scope` paths so ids stay stable between runs.

mod asset;
mod scope;
mod stack;
mod value;

pub use asset::{ImageAsset, Platform, ASSET_REPOSITORY};
pub use scope::Scope;
pub use stack::{Environment, Output, Resource, ResourceRef, Stack};
pub use value::{Pseudo, Value};

/// CloudFormation resource type names used across the crate
pub mod types {
    pub const VPC: &str = "AWS::EC2::VPC";
    pub const SUBNET: &str = "AWS::EC2::Subnet";
    pub const INTERNET_GATEWAY: &str = "AWS::EC2::InternetGateway";
    pub const GATEWAY_ATTACHMENT: &str = "AWS::EC2::VPCGatewayAttachment";
    pub const ROUTE_TABLE: &str = "AWS::EC2::RouteTable";
    pub const ROUTE_TABLE_ASSOCIATION: &str = "AWS::EC2::SubnetRouteTableAssociation";
    pub const ROUTE: &str = "AWS::EC2::Route";
    pub const EIP: &str = "AWS::EC2::EIP";
    pub const NAT_GATEWAY: &str = "AWS::EC2::NatGateway";
    pub const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
    pub const SECURITY_GROUP_INGRESS: &str = "AWS::EC2::SecurityGroupIngress";
    pub const SECRET: &str = "AWS::SecretsManager::Secret";
    pub const DB_SUBNET_GROUP: &str = "AWS::RDS::DBSubnetGroup";
    pub const DB_INSTANCE: &str = "AWS::RDS::DBInstance";
    pub const CLUSTER: &str = "AWS::ECS::Cluster";
    pub const TASK_DEFINITION: &str = "AWS::ECS::TaskDefinition";
    pub const SERVICE: &str = "AWS::ECS::Service";
    pub const ROLE: &str = "AWS::IAM::Role";
    pub const LOG_GROUP: &str = "AWS::Logs::LogGroup";
    pub const LOAD_BALANCER: &str = "AWS::ElasticLoadBalancingV2::LoadBalancer";
    pub const LISTENER: &str = "AWS::ElasticLoadBalancingV2::Listener";
    pub const TARGET_GROUP: &str = "AWS::ElasticLoadBalancingV2::TargetGroup";
    pub const SCALABLE_TARGET: &str = "AWS::ApplicationAutoScaling::ScalableTarget";
    pub const SCALING_POLICY: &str = "AWS::ApplicationAutoScaling::ScalingPolicy";
    pub const FILE_SYSTEM: &str = "AWS::EFS::FileSystem";
    pub const MOUNT_TARGET: &str = "AWS::EFS::MountTarget";
}
