//! Declarative stack synthesis for Apache Airflow on AWS Fargate
//!
//! This crate provides:
//! - A resource graph rendered as a CloudFormation template
//! - Network, database, cluster, service and task components
//! - Assembly of the full Airflow deployment from typed settings
//! - Hand-off of the finished stack to a provisioning engine
//! - Structured logging and synthesis metrics

pub mod assembler;
pub mod cluster;
pub mod database;
pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod network;
pub mod observability;
pub mod service;
pub mod settings;
pub mod task;

pub use assembler::{ApplicationAssembler, Assembly};
pub use engine::{AssemblyDirectory, ProvisioningEngine, ProvisioningReceipt};
pub use error::{ConfigurationError, ProvisioningFailure, Result, StackError};
pub use graph::{Environment, Stack, Value};
pub use models::*;
pub use observability::{StructuredLogger, SynthMetrics};
pub use settings::StackSettings;
