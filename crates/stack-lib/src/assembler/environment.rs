//! Environment shared by every Airflow container

use crate::cluster::ClusterRef;
use crate::graph::Value;
use crate::network::NetworkDescriptor;
use indexmap::IndexMap;

pub const SQL_ALCHEMY_CONN: &str = "AIRFLOW__DATABASE__SQL_ALCHEMY_CONN";
pub const EXECUTOR: &str = "AIRFLOW__CORE__EXECUTOR";
pub const BROKER_URL: &str = "AIRFLOW__CELERY__BROKER_URL";
pub const RESULT_BACKEND: &str = "AIRFLOW__CELERY__RESULT_BACKEND";
pub const WEBSERVER_RBAC: &str = "AIRFLOW__WEBSERVER__RBAC";
pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
pub const CLUSTER: &str = "CLUSTER";
pub const SUBNETS: &str = "SUBNETS";
pub const SECURITY_GROUP: &str = "SECURITY_GROUP";

/// Every key, in the order containers receive them
pub const KEYS: [&str; 9] = [
    SQL_ALCHEMY_CONN,
    EXECUTOR,
    BROKER_URL,
    RESULT_BACKEND,
    WEBSERVER_RBAC,
    ADMIN_PASSWORD,
    CLUSTER,
    SUBNETS,
    SECURITY_GROUP,
];

pub const CELERY_EXECUTOR: &str = "CeleryExecutor";
pub const SQS_BROKER_URL: &str = "sqs://";

pub fn shared_environment(
    connection: &Value,
    admin_password: &str,
    cluster: &ClusterRef,
    network: &NetworkDescriptor,
) -> IndexMap<String, Value> {
    let entries = [
        (SQL_ALCHEMY_CONN, connection.clone()),
        (EXECUTOR, Value::str(CELERY_EXECUTOR)),
        (BROKER_URL, Value::str(SQS_BROKER_URL)),
        (
            RESULT_BACKEND,
            Value::join("", vec![Value::str("db+"), connection.clone()]),
        ),
        (WEBSERVER_RBAC, Value::str("True")),
        (ADMIN_PASSWORD, Value::str(admin_password)),
        (CLUSTER, cluster.name.clone()),
        (SUBNETS, network.joined_private_subnets()),
        (SECURITY_GROUP, network.security_group_id.clone()),
    ];
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceRef;

    #[test]
    fn test_keys_and_values() {
        let cluster_resource = ResourceRef {
            logical_id: "Cluster".to_string(),
        };
        let cluster = ClusterRef {
            name: cluster_resource.id(),
            arn: cluster_resource.att("Arn"),
            resource: cluster_resource,
        };
        let network = NetworkDescriptor::imported(
            "vpc-1",
            vec![],
            vec!["subnet-1".into(), "subnet-2".into()],
            "sg-1",
        );
        let env = shared_environment(&Value::str("postgresql://x"), "pw", &cluster, &network);

        let keys: Vec<&str> = env.keys().map(String::as_str).collect();
        assert_eq!(keys, KEYS.to_vec());
        assert_eq!(env[RESULT_BACKEND], Value::str("db+postgresql://x"));
        assert_eq!(env[SUBNETS], Value::str("subnet-1,subnet-2"));
        assert_eq!(env[SECURITY_GROUP], Value::str("sg-1"));
        assert_eq!(env[CLUSTER], Value::reference("Cluster"));
        assert_eq!(env[EXECUTOR], Value::str("CeleryExecutor"));
    }
}
