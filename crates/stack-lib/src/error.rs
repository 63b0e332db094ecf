//! Error types for stack assembly
//!
//! Two kinds of failure exist: static configuration problems detected
//! before any template is produced, and failures reported by the
//! provisioning engine that consumes the template.

/// Result type alias for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Invalid static input. Assembly aborts before a graph is produced.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required name was empty.
    #[error("{context} must have a non-empty name")]
    EmptyName { context: String },

    /// Port 0 is not a usable TCP port.
    #[error("{context} port must be between 1 and 65535")]
    InvalidPort { context: String },

    /// Autoscaling bounds are inverted or empty.
    #[error("autoscaling capacity range {min}..={max} is invalid")]
    InvalidCapacityRange { min: u32, max: u32 },

    /// Target-tracking percentage outside 1..=100.
    #[error("{metric} scaling target {value}% must be between 1 and 100")]
    TargetOutOfRange { metric: &'static str, value: u32 },

    /// CloudWatch Logs only accepts a fixed set of retention periods.
    #[error("log retention of {days} days is not supported by CloudWatch Logs")]
    InvalidLogRetention { days: u32 },

    /// Fargate only accepts specific cpu/memory pairs.
    #[error("{context}: {cpu} cpu units with {memory} MiB is not a valid Fargate size")]
    InvalidFargateSize {
        context: String,
        cpu: u32,
        memory: u32,
    },

    /// Containers placed in one task exceed the task's reservation.
    #[error("containers in {task} reserve {requested} {resource}, task provides {available}")]
    TaskOvercommitted {
        task: String,
        resource: &'static str,
        requested: u64,
        available: u32,
    },

    /// Instance classes look like `t3.small`.
    #[error("database instance class '{0}' must look like '<family>.<size>'")]
    InvalidInstanceClass(String),

    /// Network address plan could not be built.
    #[error("invalid network layout: {0}")]
    InvalidNetwork(String),

    /// The same logical id was declared twice.
    #[error("resource '{0}' is already declared in this stack")]
    DuplicateResource(String),

    /// A referenced resource does not exist in the graph.
    #[error("resource '{0}' is not declared in this stack")]
    UnknownResource(String),

    /// A mount point names a volume the task does not declare.
    #[error("mount point in {task} references undeclared volume '{volume}'")]
    UnknownVolume { task: String, volume: String },

    /// A stack output with the same name already exists.
    #[error("output '{0}' is already declared in this stack")]
    DuplicateOutput(String),

    /// Settings could not be loaded or deserialized.
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Opaque failure raised by the provisioning engine. Never retried here.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningFailure {
    /// The engine could not write or read its working files.
    #[error("provisioning engine I/O failure at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The template could not be encoded for the engine.
    #[error("failed to encode cloud assembly: {0}")]
    Encode(#[from] serde_json::Error),

    /// Verbatim message reported by an external engine.
    #[error("provisioning engine reported: {0}")]
    Engine(String),
}

/// Umbrella error for library entry points.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningFailure),
}

impl StackError {
    /// Configuration errors are raised before any template exists.
    pub fn is_configuration(&self) -> bool {
        matches!(self, StackError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_messages() {
        let err = ConfigurationError::InvalidCapacityRange { min: 5, max: 1 };
        assert_eq!(
            err.to_string(),
            "autoscaling capacity range 5..=1 is invalid"
        );

        let err = ConfigurationError::InvalidFargateSize {
            context: "AirflowTask".to_string(),
            cpu: 256,
            memory: 4096,
        };
        assert!(err.to_string().contains("256 cpu units with 4096 MiB"));
    }

    #[test]
    fn test_stack_error_classification() {
        let err: StackError = ConfigurationError::InvalidInstanceClass("small".into()).into();
        assert!(err.is_configuration());

        let err: StackError = ProvisioningFailure::Engine("capacity".into()).into();
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "provisioning engine reported: capacity");
    }
}
