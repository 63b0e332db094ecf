//! Integration tests for full stack assembly

use serde_json::Value as Json;
use stack_lib::{
    assembler::environment,
    graph::types,
    network::NetworkDescriptor,
    AssemblyDirectory, ApplicationAssembler, ConfigurationError, ContainerRole,
    ProvisioningEngine, StackSettings, Value,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn two_subnet_network() -> NetworkDescriptor {
    NetworkDescriptor::imported(
        "vpc-0abc",
        vec!["subnet-pub-a".into(), "subnet-pub-b".into()],
        vec!["subnet-a".into(), "subnet-b".into()],
        "sg-0abc",
    )
}

fn assembler(settings: StackSettings) -> ApplicationAssembler {
    ApplicationAssembler::new(settings).with_network(two_subnet_network())
}

fn managed_policies(template: &Json) -> BTreeSet<String> {
    template["Resources"]
        .as_object()
        .unwrap()
        .values()
        .filter(|r| r["Type"] == types::ROLE)
        .filter_map(|r| r["Properties"]["ManagedPolicyArns"].as_array())
        .flatten()
        .map(|arn| arn.to_string())
        .collect()
}

#[test]
fn test_end_to_end_with_imported_network() {
    let assembly = assembler(StackSettings::default()).assemble().unwrap();
    let stack = &assembly.stack;

    assert_eq!(stack.count_of_type(types::CLUSTER), 1);
    assert_eq!(stack.count_of_type(types::VPC), 0);
    assert_eq!(assembly.database.connection.database, "airflow");

    let tasks = assembly.application_task_definitions();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].containers.len(), 3);

    assert_eq!(stack.count_of_type(types::SERVICE), 1);
    assert_eq!(stack.count_of_type(types::LOAD_BALANCER), 1);
    assert!(assembly.services[0].endpoint.is_some());

    assert_eq!(
        assembly.environment[environment::SUBNETS],
        Value::str("subnet-a,subnet-b")
    );
    assert_eq!(
        assembly.environment[environment::SECURITY_GROUP],
        Value::str("sg-0abc")
    );

    // DAG tasks run alongside, never as services
    assert_eq!(assembly.on_demand_tasks.tasks.len(), 2);
    assert_eq!(assembly.on_demand_tasks.mount_targets.len(), 2);
    assert_eq!(stack.count_of_type(types::TASK_DEFINITION), 3);

    assert!(stack.output_named("AdminPassword").is_some());
    assert!(stack.output_named("LoadBalancerDNSName").is_some());
}

#[test]
fn test_assembly_is_idempotent_except_admin_password() {
    let first = assembler(StackSettings::default()).assemble().unwrap();
    let second = assembler(StackSettings::default()).assemble().unwrap();

    let ids = |a: &stack_lib::Assembly| -> Vec<String> {
        a.stack.resources().map(|(id, _)| id.to_string()).collect()
    };
    assert_eq!(ids(&first), ids(&second));

    let keys = |a: &stack_lib::Assembly| -> Vec<String> { a.environment.keys().cloned().collect() };
    assert_eq!(keys(&first), keys(&second));

    for role in ContainerRole::ALL {
        assert_eq!(
            first.task_for(role).unwrap().containers.len(),
            second.task_for(role).unwrap().containers.len()
        );
    }

    assert_eq!(
        managed_policies(&first.stack.synthesize()),
        managed_policies(&second.stack.synthesize())
    );
    assert_ne!(first.admin_password, second.admin_password);
}

#[test]
fn test_dedicated_worker_pool_end_to_end() {
    let mut settings = StackSettings::default();
    settings.application.use_dedicated_worker_pool = true;
    let assembly = assembler(settings).assemble().unwrap();

    let worker = assembly.task_for(ContainerRole::Worker).unwrap();
    assert_eq!(worker.containers.len(), 1);
    assert_eq!(worker.containers[0].0, "worker");
    assert_eq!(assembly.stack.count_of_type(types::SERVICE), 2);
    assert_eq!(assembly.stack.count_of_type(types::SCALING_POLICY), 2);
    // Both services share one any-IPv4 ingress rule
    assert_eq!(
        assembly
            .stack
            .resources_of_type(types::SECURITY_GROUP_INGRESS)
            .filter(|(_, r)| r.property("CidrIp").is_some())
            .count(),
        1
    );
}

#[test]
fn test_invalid_worker_policy_rejected_before_declaration() {
    let mut settings = StackSettings::default();
    settings.application.use_dedicated_worker_pool = true;
    settings.worker_autoscaling.target_cpu_percent = Some(0);

    let result = assembler(settings).assemble();
    assert!(matches!(
        result,
        Err(ConfigurationError::TargetOutOfRange { metric: "cpu", .. })
    ));
}

#[test]
fn test_stack_tags_reach_taggable_resources() {
    let assembly = assembler(StackSettings::default()).assemble().unwrap();
    let template = assembly.stack.synthesize();

    let cluster = template["Resources"]
        .as_object()
        .unwrap()
        .values()
        .find(|r| r["Type"] == types::CLUSTER)
        .unwrap();
    assert_eq!(cluster["Properties"]["Tags"][0]["Key"], "Stack");
    assert_eq!(cluster["Properties"]["Tags"][0]["Value"], "AirflowOnFargate");
}

#[tokio::test]
async fn test_assembly_directory_round_trip() {
    let assembly = assembler(StackSettings::default()).assemble().unwrap();
    let dir = TempDir::new().unwrap();
    let engine = AssemblyDirectory::new(dir.path());

    let receipt = engine.provision(&assembly.stack).await.unwrap();
    assert_eq!(receipt.stack_name, "AirflowOnFargateStack");

    let body = tokio::fs::read_to_string(dir.path().join("AirflowOnFargateStack.template.json"))
        .await
        .unwrap();
    let template: Json = serde_json::from_str(&body).unwrap();
    let resources = template["Resources"].as_object().unwrap();
    for (id, _) in assembly.stack.resources() {
        assert!(resources.contains_key(id), "missing {}", id);
    }

    let assets = tokio::fs::read_to_string(dir.path().join("AirflowOnFargateStack.assets.json"))
        .await
        .unwrap();
    let assets: Json = serde_json::from_str(&assets).unwrap();
    // ./airflow plus the two DAG task images
    assert_eq!(assets["dockerImages"].as_object().unwrap().len(), 3);
}
