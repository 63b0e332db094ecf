//! AWS managed policies granted to application task roles

pub const SQS_FULL_ACCESS: &str = "AmazonSQSFullAccess";
pub const ECS_FULL_ACCESS: &str = "AmazonECS_FullAccess";
pub const EFS_CLIENT_READ_WRITE: &str = "AmazonElasticFileSystemClientReadWriteAccess";
pub const CLOUDWATCH_LOGS_READ_ONLY: &str = "CloudWatchLogsReadOnlyAccess";

/// Granted to every service task role regardless of its role.
///
/// Broader than any single role needs: workers use the queue, the
/// scheduler launches DAG tasks on the cluster, the webserver reads logs.
pub const SERVICE_TASK_POLICIES: [&str; 4] = [
    SQS_FULL_ACCESS,
    ECS_FULL_ACCESS,
    EFS_CLIENT_READ_WRITE,
    CLOUDWATCH_LOGS_READ_ONLY,
];
