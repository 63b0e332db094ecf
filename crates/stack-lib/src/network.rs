//! Virtual network and shared security boundary
//!
//! Builds a VPC with one public and one private subnet per availability
//! zone, NAT egress for the private subnets, and the security group every
//! other component attaches to.

use crate::error::ConfigurationError;
use crate::graph::{types, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::NetworkConfig;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Construct id of the shared security group
pub const SECURITY_GROUP_ID: &str = "SecurityGroup";

/// Smallest subnet the fabric will carve
const MIN_SUBNET_PREFIX: u8 = 28;

const ANY_IPV4: &str = "0.0.0.0/0";

/// Identifiers of the network every component deploys into
///
/// Shared read-only after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkDescriptor {
    pub vpc_id: Value,
    pub public_subnet_ids: Vec<Value>,
    pub private_subnet_ids: Vec<Value>,
    pub security_group_id: Value,
}

impl NetworkDescriptor {
    /// Describe an existing network by its literal identifiers.
    pub fn imported(
        vpc_id: impl Into<String>,
        public_subnet_ids: Vec<String>,
        private_subnet_ids: Vec<String>,
        security_group_id: impl Into<String>,
    ) -> Self {
        Self {
            vpc_id: Value::str(vpc_id),
            public_subnet_ids: public_subnet_ids.into_iter().map(Value::String).collect(),
            private_subnet_ids: private_subnet_ids.into_iter().map(Value::String).collect(),
            security_group_id: Value::str(security_group_id),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.private_subnet_ids.is_empty() {
            return Err(ConfigurationError::InvalidNetwork(
                "at least one private subnet is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Private subnet ids joined with commas, in declaration order
    pub fn joined_private_subnets(&self) -> Value {
        Value::join(",", self.private_subnet_ids.clone())
    }

    /// Let members of the security group reach each other on a TCP port.
    pub fn allow_internally(
        &self,
        stack: &mut Stack,
        port: u16,
    ) -> Result<ResourceRef, ConfigurationError> {
        let rule = format!("from {}:{}", SECURITY_GROUP_ID, port);
        self.ingress(
            stack,
            &rule,
            Resource::new(types::SECURITY_GROUP_INGRESS)
                .with("IpProtocol", "tcp")
                .with("FromPort", port)
                .with("ToPort", port)
                .with("GroupId", self.security_group_id.clone())
                .with("SourceSecurityGroupId", self.security_group_id.clone())
                .with("Description", format!("Allow internal tcp:{}", port)),
        )
    }

    /// Open a TCP port range to any IPv4 address.
    pub fn allow_from_any_ipv4(
        &self,
        stack: &mut Stack,
        from_port: u16,
        to_port: u16,
    ) -> Result<ResourceRef, ConfigurationError> {
        let rule = format!("from {}:{}-{}", ANY_IPV4, from_port, to_port);
        self.ingress(
            stack,
            &rule,
            Resource::new(types::SECURITY_GROUP_INGRESS)
                .with("IpProtocol", "tcp")
                .with("FromPort", from_port)
                .with("ToPort", to_port)
                .with("GroupId", self.security_group_id.clone())
                .with("CidrIp", ANY_IPV4)
                .with("Description", format!("Allow from {}", ANY_IPV4)),
        )
    }

    // Identical rules map to the same scope, so a second request is a no-op.
    fn ingress(
        &self,
        stack: &mut Stack,
        rule: &str,
        resource: Resource,
    ) -> Result<ResourceRef, ConfigurationError> {
        let scope = stack.scope().child(SECURITY_GROUP_ID).child(rule);
        let existing = ResourceRef {
            logical_id: scope.logical_id(),
        };
        if stack.resource(&existing.logical_id).is_some() {
            debug!(rule = %rule, "Ingress rule already declared");
            return Ok(existing);
        }
        stack.add(&scope, resource)
    }
}

/// Subnets declared in one availability zone
#[derive(Debug, Clone)]
pub struct ZoneSubnets {
    pub public: ResourceRef,
    pub private: ResourceRef,
    pub nat_gateway: ResourceRef,
}

/// The VPC, its subnets and the shared security group
#[derive(Debug, Clone)]
pub struct NetworkFabric {
    pub vpc: ResourceRef,
    pub zones: Vec<ZoneSubnets>,
    pub security_group: ResourceRef,
}

impl NetworkFabric {
    pub fn build(
        stack: &mut Stack,
        scope: &Scope,
        config: &NetworkConfig,
    ) -> Result<Self, ConfigurationError> {
        if config.max_azs == 0 {
            return Err(ConfigurationError::InvalidNetwork(
                "max_azs must be at least 1".to_string(),
            ));
        }
        let zone_count = config.max_azs as usize;
        let blocks = carve_cidr(&config.cidr, zone_count * 2)?;
        let (public_blocks, private_blocks) = blocks.split_at(zone_count);

        let vpc = stack.add(
            scope,
            Resource::new(types::VPC)
                .with("CidrBlock", config.cidr.as_str())
                .with("EnableDnsHostnames", true)
                .with("EnableDnsSupport", true)
                .with("InstanceTenancy", "default")
                .with("Tags", name_tag(scope)),
        )?;

        let igw_scope = scope.child("IGW");
        let igw = stack.add(
            &igw_scope,
            Resource::new(types::INTERNET_GATEWAY).with("Tags", name_tag(scope)),
        )?;
        let attachment = stack.add(
            &scope.child("VPCGW"),
            Resource::new(types::GATEWAY_ATTACHMENT)
                .with("VpcId", vpc.id())
                .with("InternetGatewayId", igw.id()),
        )?;

        let mut zones = Vec::with_capacity(zone_count);
        for (index, (public_cidr, private_cidr)) in
            public_blocks.iter().zip(private_blocks).enumerate()
        {
            let az = Value::Select(index as u32, Box::new(Value::GetAzs));

            let public_scope = scope.child(format!("PublicSubnet{}", index + 1));
            let public = declare_subnet(stack, &public_scope, &vpc, az.clone(), public_cidr, true)?;
            let public_route_table = declare_route_table(stack, &public_scope, &vpc, &public)?;
            stack.add(
                &public_scope.child("DefaultRoute"),
                Resource::new(types::ROUTE)
                    .with("RouteTableId", public_route_table.id())
                    .with("DestinationCidrBlock", ANY_IPV4)
                    .with("GatewayId", igw.id())
                    .depends_on(&attachment.logical_id),
            )?;

            let eip = stack.add(
                &public_scope.child("EIP"),
                Resource::new(types::EIP)
                    .with("Domain", "vpc")
                    .with("Tags", name_tag(&public_scope)),
            )?;
            let nat_gateway = stack.add(
                &public_scope.child("NATGateway"),
                Resource::new(types::NAT_GATEWAY)
                    .with("SubnetId", public.id())
                    .with("AllocationId", eip.att("AllocationId"))
                    .with("Tags", name_tag(&public_scope))
                    .depends_on(&attachment.logical_id),
            )?;

            let private_scope = scope.child(format!("PrivateSubnet{}", index + 1));
            let private = declare_subnet(stack, &private_scope, &vpc, az, private_cidr, false)?;
            let private_route_table = declare_route_table(stack, &private_scope, &vpc, &private)?;
            stack.add(
                &private_scope.child("DefaultRoute"),
                Resource::new(types::ROUTE)
                    .with("RouteTableId", private_route_table.id())
                    .with("DestinationCidrBlock", ANY_IPV4)
                    .with("NatGatewayId", nat_gateway.id()),
            )?;

            zones.push(ZoneSubnets {
                public,
                private,
                nat_gateway,
            });
        }

        let sg_scope = stack.scope().child(SECURITY_GROUP_ID);
        let security_group = stack.add(
            &sg_scope,
            Resource::new(types::SECURITY_GROUP)
                .with("GroupDescription", sg_scope.path())
                .with("VpcId", vpc.id())
                .with(
                    "SecurityGroupEgress",
                    vec![Value::map([
                        ("CidrIp", Value::str(ANY_IPV4)),
                        ("Description", Value::str("Allow all outbound traffic by default")),
                        ("IpProtocol", Value::str("-1")),
                    ])],
                ),
        )?;

        info!(
            vpc = %vpc.logical_id,
            zones = zone_count,
            cidr = %config.cidr,
            "Network fabric declared"
        );

        Ok(Self {
            vpc,
            zones,
            security_group,
        })
    }

    pub fn descriptor(&self) -> NetworkDescriptor {
        NetworkDescriptor {
            vpc_id: self.vpc.id(),
            public_subnet_ids: self.zones.iter().map(|z| z.public.id()).collect(),
            private_subnet_ids: self.zones.iter().map(|z| z.private.id()).collect(),
            security_group_id: self.security_group.att("GroupId"),
        }
    }
}

fn name_tag(scope: &Scope) -> Value {
    Value::List(vec![Value::map([
        ("Key", Value::str("Name")),
        ("Value", Value::str(scope.path())),
    ])])
}

fn declare_subnet(
    stack: &mut Stack,
    scope: &Scope,
    vpc: &ResourceRef,
    availability_zone: Value,
    cidr: &str,
    public: bool,
) -> Result<ResourceRef, ConfigurationError> {
    let subnet_type = if public { "Public" } else { "Private" };
    stack.add(
        &scope.child("Subnet"),
        Resource::new(types::SUBNET)
            .with("VpcId", vpc.id())
            .with("AvailabilityZone", availability_zone)
            .with("CidrBlock", cidr)
            .with("MapPublicIpOnLaunch", public)
            .with(
                "Tags",
                vec![
                    Value::map([
                        ("Key", Value::str("Name")),
                        ("Value", Value::str(scope.path())),
                    ]),
                    Value::map([
                        ("Key", Value::str("subnet-type")),
                        ("Value", Value::str(subnet_type)),
                    ]),
                ],
            ),
    )
}

fn declare_route_table(
    stack: &mut Stack,
    scope: &Scope,
    vpc: &ResourceRef,
    subnet: &ResourceRef,
) -> Result<ResourceRef, ConfigurationError> {
    let route_table = stack.add(
        &scope.child("RouteTable"),
        Resource::new(types::ROUTE_TABLE)
            .with("VpcId", vpc.id())
            .with("Tags", name_tag(scope)),
    )?;
    stack.add(
        &scope.child("RouteTableAssociation"),
        Resource::new(types::ROUTE_TABLE_ASSOCIATION)
            .with("RouteTableId", route_table.id())
            .with("SubnetId", subnet.id()),
    )?;
    Ok(route_table)
}

/// Split an IPv4 block into `count` equal, consecutive sub-blocks.
pub fn carve_cidr(cidr: &str, count: usize) -> Result<Vec<String>, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidNetwork(format!("'{}' is not an IPv4 CIDR block", cidr));

    let (address, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let address: Ipv4Addr = address.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 || count == 0 {
        return Err(invalid());
    }

    let extra_bits = usize::BITS - (count - 1).leading_zeros();
    let subnet_prefix = prefix as u32 + extra_bits;
    if subnet_prefix > MIN_SUBNET_PREFIX as u32 {
        return Err(ConfigurationError::InvalidNetwork(format!(
            "{} cannot be split into {} subnets",
            cidr, count
        )));
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let base = u32::from(address) & mask;
    let block_size = 1u64 << (32 - subnet_prefix);

    Ok((0..count as u64)
        .map(|i| {
            let start = u64::from(base) + i * block_size;
            format!("{}/{}", Ipv4Addr::from(start as u32), subnet_prefix)
        })
        .collect())
}
