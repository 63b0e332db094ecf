//! Observability for stack synthesis
//!
//! Provides:
//! - Prometheus metrics (resources declared per type, synthesis latency)
//! - Structured event logging with tracing

use crate::graph::Stack;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::path::Path;
use tracing::{info, warn};

/// Histogram buckets for synthesis latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0];

/// Synthesis metrics
///
/// Each handle owns its registry, so several can coexist in one process.
#[derive(Clone)]
pub struct SynthMetrics {
    registry: Registry,
    resources_declared: IntCounterVec,
    synthesis_latency_seconds: Histogram,
    outputs_declared: IntGauge,
    image_assets: IntGauge,
}

impl SynthMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let resources_declared = IntCounterVec::new(
            Opts::new(
                "stack_resources_declared_total",
                "Resources declared in synthesized stacks",
            ),
            &["resource_type"],
        )?;
        let synthesis_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "stack_synthesis_latency_seconds",
                "Time spent assembling and rendering a stack",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let outputs_declared = IntGauge::new(
            "stack_outputs_declared",
            "Outputs declared by the last synthesized stack",
        )?;
        let image_assets = IntGauge::new(
            "stack_image_assets",
            "Container image assets referenced by the last synthesized stack",
        )?;

        registry.register(Box::new(resources_declared.clone()))?;
        registry.register(Box::new(synthesis_latency_seconds.clone()))?;
        registry.register(Box::new(outputs_declared.clone()))?;
        registry.register(Box::new(image_assets.clone()))?;

        Ok(Self {
            registry,
            resources_declared,
            synthesis_latency_seconds,
            outputs_declared,
            image_assets,
        })
    }

    pub fn observe_synthesis_latency(&self, duration_secs: f64) {
        self.synthesis_latency_seconds.observe(duration_secs);
    }

    /// Record the shape of a finished stack
    pub fn record_stack(&self, stack: &Stack) {
        for (_, resource) in stack.resources() {
            self.resources_declared
                .with_label_values(&[resource.resource_type.as_str()])
                .inc();
        }
        self.outputs_declared.set(stack.outputs().count() as i64);
        self.image_assets.set(stack.assets().count() as i64);
    }

    pub fn resources_of_type(&self, resource_type: &str) -> u64 {
        self.resources_declared
            .with_label_values(&[resource_type])
            .get()
    }

    /// Prometheus text exposition of every metric
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for synthesis events
#[derive(Clone)]
pub struct StructuredLogger {
    stack_name: String,
}

impl StructuredLogger {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
        }
    }

    pub fn log_synthesis_started(&self, environment: &str, dedicated_worker_pool: bool) {
        info!(
            event = "synthesis_started",
            stack = %self.stack_name,
            environment = %environment,
            dedicated_worker_pool = dedicated_worker_pool,
            "Assembling stack"
        );
    }

    pub fn log_component(&self, component: &str, logical_id: &str) {
        info!(
            event = "resource_declared",
            stack = %self.stack_name,
            component = %component,
            logical_id = %logical_id,
            "Component declared"
        );
    }

    pub fn log_stack_synthesized(&self, stack: &Stack) {
        info!(
            event = "stack_synthesized",
            stack = %self.stack_name,
            resources = stack.len(),
            outputs = stack.outputs().count(),
            assets = stack.assets().count(),
            "Stack synthesized"
        );
    }

    /// Warn about an output that carries a secret in plaintext
    pub fn log_sensitive_output(&self, output: &str) {
        warn!(
            event = "sensitive_output",
            stack = %self.stack_name,
            output = %output,
            "Stack output exposes a secret in plaintext"
        );
    }

    pub fn log_assembly_written(&self, directory: &Path, files: usize) {
        info!(
            event = "assembly_written",
            stack = %self.stack_name,
            directory = %directory.display(),
            files = files,
            "Cloud assembly written"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Environment, Resource};

    #[test]
    fn test_metrics_record_stack_shape() {
        let metrics = SynthMetrics::new().unwrap();
        let mut stack = Stack::new("Test", Environment::default());
        let root = stack.scope();
        stack.add(&root.child("A"), Resource::new("AWS::ECS::Cluster")).unwrap();
        stack.add(&root.child("B"), Resource::new("AWS::IAM::Role")).unwrap();
        stack.add(&root.child("C"), Resource::new("AWS::IAM::Role")).unwrap();

        metrics.record_stack(&stack);
        metrics.observe_synthesis_latency(0.002);

        assert_eq!(metrics.resources_of_type("AWS::IAM::Role"), 2);
        assert_eq!(metrics.resources_of_type("AWS::ECS::Cluster"), 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("stack_resources_declared_total"));
        assert!(text.contains("stack_synthesis_latency_seconds"));
    }

    #[test]
    fn test_independent_registries() {
        // Separate registries must not collide on metric names.
        let a = SynthMetrics::new();
        let b = SynthMetrics::new();
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("AirflowOnFargateStack");
        assert_eq!(logger.stack_name, "AirflowOnFargateStack");
    }
}
