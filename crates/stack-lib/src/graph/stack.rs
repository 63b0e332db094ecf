//! The stack: an ordered set of resources, outputs and assets

use super::asset::ImageAsset;
use super::scope::Scope;
use super::value::Value;
use crate::error::ConfigurationError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tracing::debug;

/// Resource types that accept a `Tags` property
const TAGGABLE_TYPES: &[&str] = &[
    "AWS::EC2::VPC",
    "AWS::EC2::Subnet",
    "AWS::EC2::RouteTable",
    "AWS::EC2::InternetGateway",
    "AWS::EC2::NatGateway",
    "AWS::EC2::EIP",
    "AWS::EC2::SecurityGroup",
    "AWS::SecretsManager::Secret",
    "AWS::RDS::DBInstance",
    "AWS::RDS::DBSubnetGroup",
    "AWS::ECS::Cluster",
    "AWS::ECS::TaskDefinition",
    "AWS::ECS::Service",
    "AWS::ElasticLoadBalancingV2::LoadBalancer",
    "AWS::ElasticLoadBalancingV2::TargetGroup",
    "AWS::IAM::Role",
    "AWS::Logs::LogGroup",
];

/// Property holding the tag list, if the resource type can be tagged
fn tag_property(resource_type: &str) -> Option<&'static str> {
    match resource_type {
        "AWS::EFS::FileSystem" => Some("FileSystemTags"),
        t if TAGGABLE_TYPES.contains(&t) => Some("Tags"),
        _ => None,
    }
}

/// Target account and region of a deployment
///
/// Either may be unknown; the engine then falls back to its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Environment {
    pub fn new(account: Option<String>, region: Option<String>) -> Self {
        Self { account, region }
    }

    pub fn uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

/// A single declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub resource_type: String,
    pub properties: IndexMap<String, Value>,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property only when a value is present
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Append to a list property, creating it when missing.
    /// Items already present are not added twice.
    pub fn push_unique(&mut self, key: &str, item: Value) {
        match self.properties.get_mut(key) {
            Some(Value::List(items)) => {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            _ => {
                self.properties.insert(key.to_string(), Value::List(vec![item]));
            }
        }
    }

    fn to_json(&self, tags: &IndexMap<String, String>) -> Json {
        let mut properties = Map::new();
        for (key, value) in &self.properties {
            properties.insert(key.clone(), value.to_json());
        }

        let tag_key = tag_property(&self.resource_type).filter(|_| !tags.is_empty());
        if let Some(tag_key) = tag_key {
            let mut merged = match properties.remove(tag_key) {
                Some(Json::Array(existing)) => existing,
                _ => Vec::new(),
            };
            for (key, value) in tags {
                let already = merged
                    .iter()
                    .any(|t| t.get("Key").and_then(Json::as_str) == Some(key.as_str()));
                if !already {
                    merged.push(json!({ "Key": key, "Value": value }));
                }
            }
            properties.insert(tag_key.to_string(), Json::Array(merged));
        }

        let mut out = Map::new();
        out.insert("Type".to_string(), Json::String(self.resource_type.clone()));
        if !properties.is_empty() {
            out.insert("Properties".to_string(), Json::Object(properties));
        }
        if !self.depends_on.is_empty() {
            out.insert("DependsOn".to_string(), json!(self.depends_on));
        }
        Json::Object(out)
    }
}

/// Handle to a resource declared in a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub logical_id: String,
}

impl ResourceRef {
    /// `Ref` of the resource
    pub fn id(&self) -> Value {
        Value::reference(&self.logical_id)
    }

    pub fn att(&self, attribute: &str) -> Value {
        Value::get_att(&self.logical_id, attribute)
    }
}

/// A deployment-time output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: Option<String>,
}

/// The declarative resource graph handed to the provisioning engine
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    environment: Environment,
    description: Option<String>,
    resources: IndexMap<String, Resource>,
    outputs: IndexMap<String, Output>,
    tags: IndexMap<String, String>,
    assets: IndexMap<String, ImageAsset>,
}

impl Stack {
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            description: None,
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
            tags: IndexMap::new(),
            assets: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn scope(&self) -> Scope {
        Scope::stack(&self.name)
    }

    /// Declare a resource at `scope`. Fails if the id is taken.
    pub fn add(
        &mut self,
        scope: &Scope,
        resource: Resource,
    ) -> Result<ResourceRef, ConfigurationError> {
        let logical_id = scope.logical_id();
        if self.resources.contains_key(&logical_id) {
            return Err(ConfigurationError::DuplicateResource(logical_id));
        }
        debug!(
            logical_id = %logical_id,
            resource_type = %resource.resource_type,
            path = %scope,
            "Declared resource"
        );
        self.resources.insert(logical_id.clone(), resource);
        Ok(ResourceRef { logical_id })
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Result<&mut Resource, ConfigurationError> {
        self.resources
            .get_mut(logical_id)
            .ok_or_else(|| ConfigurationError::UnknownResource(logical_id.to_string()))
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn count_of_type(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn add_output(
        &mut self,
        scope: &Scope,
        value: Value,
        description: Option<String>,
    ) -> Result<String, ConfigurationError> {
        let logical_id = scope.logical_id();
        if self.outputs.contains_key(&logical_id) {
            return Err(ConfigurationError::DuplicateOutput(logical_id));
        }
        self.outputs.insert(
            logical_id.clone(),
            Output {
                name: scope.id().to_string(),
                value,
                description,
            },
        );
        Ok(logical_id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Find an output by its construct name (e.g. `AdminPassword`).
    pub fn output_named(&self, name: &str) -> Option<&Output> {
        self.outputs.values().find(|o| o.name == name)
    }

    /// Tag every taggable resource in the stack.
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn tags(&self) -> &IndexMap<String, String> {
        &self.tags
    }

    /// Register an image asset, returning the already known one when the
    /// same build context was registered before.
    pub fn add_image_asset(&mut self, asset: ImageAsset) -> ImageAsset {
        self.assets
            .entry(asset.fingerprint.clone())
            .or_insert(asset)
            .clone()
    }

    pub fn assets(&self) -> impl Iterator<Item = &ImageAsset> {
        self.assets.values()
    }

    /// Check that every reference points at a declared resource.
    pub fn check_references(&self) -> Result<(), ConfigurationError> {
        for resource in self.resources.values() {
            let referenced = resource
                .properties
                .values()
                .flat_map(Value::references)
                .chain(resource.depends_on.iter().map(String::as_str));
            for id in referenced {
                if !self.resources.contains_key(id) {
                    return Err(ConfigurationError::UnknownResource(id.to_string()));
                }
            }
        }
        for output in self.outputs.values() {
            for id in output.value.references() {
                if !self.resources.contains_key(id) {
                    return Err(ConfigurationError::UnknownResource(id.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Render the CloudFormation template
    pub fn synthesize(&self) -> Json {
        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".to_string(),
            Json::String("2010-09-09".to_string()),
        );
        if let Some(description) = &self.description {
            template.insert("Description".to_string(), Json::String(description.clone()));
        }

        let mut resources = Map::new();
        for (id, resource) in &self.resources {
            resources.insert(id.clone(), resource.to_json(&self.tags));
        }
        template.insert("Resources".to_string(), Json::Object(resources));

        if !self.outputs.is_empty() {
            let mut outputs = Map::new();
            for (id, output) in &self.outputs {
                let mut entry = Map::new();
                entry.insert("Value".to_string(), output.value.to_json());
                if let Some(description) = &output.description {
                    entry.insert("Description".to_string(), Json::String(description.clone()));
                }
                outputs.insert(id.clone(), Json::Object(entry));
            }
            template.insert("Outputs".to_string(), Json::Object(outputs));
        }

        Json::Object(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Stack {
        Stack::new("TestStack", Environment::default())
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let mut stack = stack();
        let scope = stack.scope().child("Cluster");
        stack.add(&scope, Resource::new("AWS::ECS::Cluster")).unwrap();

        let err = stack
            .add(&scope, Resource::new("AWS::ECS::Cluster"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateResource(_)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_tags_applied_only_to_taggable_types() {
        let mut stack = stack();
        let root = stack.scope();
        stack
            .add(&root.child("Vpc"), Resource::new("AWS::EC2::VPC"))
            .unwrap();
        stack
            .add(
                &root.child("Route"),
                Resource::new("AWS::EC2::Route").with("DestinationCidrBlock", "0.0.0.0/0"),
            )
            .unwrap();
        stack.add_tag("Stack", "AirflowOnFargate");

        let template = stack.synthesize();
        let resources = template["Resources"].as_object().unwrap();
        let vpc = resources
            .values()
            .find(|r| r["Type"] == "AWS::EC2::VPC")
            .unwrap();
        assert_eq!(
            vpc["Properties"]["Tags"],
            json!([{ "Key": "Stack", "Value": "AirflowOnFargate" }])
        );
        let route = resources
            .values()
            .find(|r| r["Type"] == "AWS::EC2::Route")
            .unwrap();
        assert!(route["Properties"].get("Tags").is_none());
    }

    #[test]
    fn test_filesystem_tags_use_their_own_property() {
        let mut stack = stack();
        let root = stack.scope();
        stack
            .add(
                &root.child("FileSystem"),
                Resource::new("AWS::EFS::FileSystem").with("Encrypted", true),
            )
            .unwrap();
        stack.add_tag("Stack", "AirflowOnFargate");

        let template = stack.synthesize();
        let fs = template["Resources"]
            .as_object()
            .unwrap()
            .values()
            .next()
            .unwrap();
        assert_eq!(
            fs["Properties"]["FileSystemTags"],
            json!([{ "Key": "Stack", "Value": "AirflowOnFargate" }])
        );
        assert!(fs["Properties"].get("Tags").is_none());
    }

    #[test]
    fn test_check_references_finds_dangling_ids() {
        let mut stack = stack();
        let root = stack.scope();
        stack
            .add(
                &root.child("Subnet"),
                Resource::new("AWS::EC2::Subnet").with("VpcId", Value::reference("Missing")),
            )
            .unwrap();
        assert!(matches!(
            stack.check_references(),
            Err(ConfigurationError::UnknownResource(id)) if id == "Missing"
        ));
    }

    #[test]
    fn test_push_unique_deduplicates() {
        let mut role = Resource::new("AWS::IAM::Role");
        role.push_unique("ManagedPolicyArns", Value::managed_policy_arn("A"));
        role.push_unique("ManagedPolicyArns", Value::managed_policy_arn("A"));
        role.push_unique("ManagedPolicyArns", Value::managed_policy_arn("B"));
        match role.property("ManagedPolicyArns") {
            Some(Value::List(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_outputs_and_environment_uri() {
        let mut stack = stack();
        let scope = stack.scope().child("AdminPassword");
        stack.add_output(&scope, Value::str("secret"), None).unwrap();
        assert!(stack.add_output(&scope, Value::str("again"), None).is_err());
        assert_eq!(
            stack.output_named("AdminPassword").unwrap().value,
            Value::str("secret")
        );

        assert_eq!(stack.environment().uri(), "aws://unknown-account/unknown-region");
        let env = Environment::new(Some("123456789012".into()), Some("eu-west-1".into()));
        assert_eq!(env.uri(), "aws://123456789012/eu-west-1");
    }

    #[test]
    fn test_assets_are_deduplicated() {
        let mut stack = stack();
        let a = stack.add_image_asset(ImageAsset::new("./airflow", Default::default()));
        let b = stack.add_image_asset(ImageAsset::new("./airflow", Default::default()));
        assert_eq!(a, b);
        assert_eq!(stack.assets().count(), 1);
    }
}
