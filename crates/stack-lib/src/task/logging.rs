//! CloudWatch log sink shared by container definitions

use crate::error::ConfigurationError;
use crate::graph::{types, Pseudo, Resource, ResourceRef, Scope, Stack, Value};
use crate::models::validate_log_retention;

/// Log group plus stream prefix, rendered as an `awslogs` driver
#[derive(Debug, Clone, PartialEq)]
pub struct LogSink {
    pub log_group: ResourceRef,
    pub stream_prefix: String,
}

impl LogSink {
    /// Declare a log group at `scope`. Without a name the engine picks one.
    pub fn declare(
        stack: &mut Stack,
        scope: &Scope,
        log_group_name: Option<&str>,
        retention_days: u32,
        stream_prefix: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        validate_log_retention(retention_days)?;
        let log_group = stack.add(
            scope,
            Resource::new(types::LOG_GROUP)
                .with_opt("LogGroupName", log_group_name)
                .with("RetentionInDays", retention_days),
        )?;
        Ok(Self {
            log_group,
            stream_prefix: stream_prefix.into(),
        })
    }

    pub fn log_configuration(&self) -> Value {
        Value::map([
            ("LogDriver", Value::str("awslogs")),
            (
                "Options",
                Value::map([
                    ("awslogs-group", self.log_group.id()),
                    ("awslogs-stream-prefix", Value::str(&self.stream_prefix)),
                    ("awslogs-region", Value::pseudo(Pseudo::Region)),
                ]),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Environment;

    #[test]
    fn test_log_sink_declares_group_with_retention() {
        let mut stack = Stack::new("Test", Environment::default());
        let scope = stack.scope().child("Logs");
        let sink = LogSink::declare(&mut stack, &scope, Some("Group"), 30, "Prefix").unwrap();

        let group = stack.resource(&sink.log_group.logical_id).unwrap();
        assert_eq!(group.property("RetentionInDays"), Some(&Value::Number(30)));
        assert_eq!(group.property("LogGroupName"), Some(&Value::str("Group")));

        let config = sink.log_configuration().to_json();
        assert_eq!(config["LogDriver"], "awslogs");
        assert_eq!(config["Options"]["awslogs-stream-prefix"], "Prefix");
    }

    #[test]
    fn test_unsupported_retention_is_rejected() {
        let mut stack = Stack::new("Test", Environment::default());
        let scope = stack.scope().child("Logs");
        assert!(LogSink::declare(&mut stack, &scope, None, 42, "Prefix").is_err());
        assert!(stack.is_empty());
    }
}
