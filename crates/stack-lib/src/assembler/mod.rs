//! Airflow application assembly
//!
//! Wires the network, database, cluster, application services and DAG
//! tasks into a single stack. Components are declared in dependency order
//! and only ever see the narrow descriptors of what came before them.

mod dag_tasks;
pub mod environment;

pub use dag_tasks::{DagTasks, NFS_PORT};

use crate::cluster::{ClusterRef, ComputeCluster};
use crate::database::DatabaseProvisioner;
use crate::engine::{ProvisioningEngine, ProvisioningReceipt};
use crate::error::{ConfigurationError, Result};
use crate::graph::{ImageAsset, Platform, Stack, Value};
use crate::models::ContainerRole;
use crate::network::{NetworkDescriptor, NetworkFabric};
use crate::observability::{StructuredLogger, SynthMetrics};
use crate::service::{ComposedService, ServiceComposer, ServiceKind};
use crate::settings::StackSettings;
use crate::task::{ContainerDefinition, FargateTaskDefinition, LogSink, TaskDefinitionRef};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

pub const APPLICATION_LOG_PREFIX: &str = "AirflowLogs";

/// Where the network comes from
#[derive(Debug, Clone)]
enum NetworkSource {
    Create,
    Import(NetworkDescriptor),
}

/// Everything declared by one assembly pass
#[derive(Debug, Clone)]
pub struct Assembly {
    pub stack: Stack,
    pub network: NetworkDescriptor,
    pub cluster: ClusterRef,
    pub database: DatabaseProvisioner,
    /// Task definition hosting each role
    pub task_definitions: BTreeMap<ContainerRole, TaskDefinitionRef>,
    pub services: Vec<ComposedService>,
    pub on_demand_tasks: DagTasks,
    /// Environment injected into every application container
    pub environment: IndexMap<String, Value>,
    pub admin_password: String,
}

impl Assembly {
    /// Distinct application task definitions, in declaration order
    pub fn application_task_definitions(&self) -> Vec<&TaskDefinitionRef> {
        let mut distinct: Vec<&TaskDefinitionRef> = Vec::new();
        for role in ContainerRole::ALL {
            if let Some(task) = self.task_definitions.get(&role) {
                if !distinct.iter().any(|t| t.resource == task.resource) {
                    distinct.push(task);
                }
            }
        }
        distinct
    }

    pub fn task_for(&self, role: ContainerRole) -> Option<&TaskDefinitionRef> {
        self.task_definitions.get(&role)
    }
}

pub struct ApplicationAssembler {
    settings: StackSettings,
    network: NetworkSource,
    metrics: Option<SynthMetrics>,
}

impl ApplicationAssembler {
    pub fn new(settings: StackSettings) -> Self {
        Self {
            settings,
            network: NetworkSource::Create,
            metrics: None,
        }
    }

    /// Deploy into an existing network instead of creating one.
    pub fn with_network(mut self, network: NetworkDescriptor) -> Self {
        self.network = NetworkSource::Import(network);
        self
    }

    pub fn with_metrics(mut self, metrics: SynthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    /// Run one assembly pass. Nothing is returned unless every component
    /// was declared and every reference resolves.
    pub fn assemble(&self) -> std::result::Result<Assembly, ConfigurationError> {
        let started = Instant::now();
        let settings = &self.settings;
        settings.validate()?;

        let logger = StructuredLogger::new(&settings.stack_name);
        logger.log_synthesis_started(
            &settings.environment.uri(),
            settings.application.use_dedicated_worker_pool,
        );

        let mut stack = Stack::new(&settings.stack_name, settings.environment.clone());
        for (key, value) in &settings.tags {
            stack.add_tag(key, value);
        }
        let root = stack.scope();

        let network = match &self.network {
            NetworkSource::Create => {
                let fabric =
                    NetworkFabric::build(&mut stack, &root.child("VPC"), &settings.network)?;
                logger.log_component("network", &fabric.vpc.logical_id);
                fabric.descriptor()
            }
            NetworkSource::Import(descriptor) => {
                descriptor.validate()?;
                descriptor.clone()
            }
        };

        let cluster = ComputeCluster::build(&mut stack, &root.child("ECSCluster"))?;
        logger.log_component("cluster", &cluster.resource.logical_id);

        let database = DatabaseProvisioner::provision(
            &mut stack,
            &root.child("RDS-PostgreSQL"),
            &network,
            &settings.database,
        )?;
        logger.log_component("database", &database.instance.logical_id);

        let admin_password = Uuid::new_v4().to_string();
        let shared = environment::shared_environment(
            &database.connection_string(),
            &admin_password,
            &cluster,
            &network,
        );

        let app_scope = root.child("AirflowService");
        let app = &settings.application;
        let image = stack.add_image_asset(ImageAsset::new(
            &settings.image_directory,
            Platform::LinuxAmd64,
        ));
        let logging = LogSink::declare(
            &mut stack,
            &app_scope.child("AirflowLogs"),
            None,
            app.log_retention_days,
            APPLICATION_LOG_PREFIX,
        )?;

        let mut primary = FargateTaskDefinition::new(
            app_scope.child("AirflowTask"),
            app.cpu_units,
            app.memory_mib,
        );
        let mut worker_task = app.use_dedicated_worker_pool.then(|| {
            FargateTaskDefinition::new(app_scope.child("WorkerTask"), app.cpu_units, app.memory_mib)
        });

        for role in ContainerRole::ALL {
            let spec = app.container(role);
            let container = ContainerDefinition::new(&spec.name, image.image_uri())
                .entry_point(&spec.entrypoint_path)
                .port(spec.listen_port)
                .memory_reservation(spec.memory_mib)
                .environment(shared.clone())
                .logging(&logging);
            match (role, worker_task.as_mut()) {
                (ContainerRole::Worker, Some(worker)) => worker.add_container(container),
                _ => primary.add_container(container),
            }
        }

        let primary = primary.declare(&mut stack)?;
        let worker_task = worker_task
            .map(|task| task.declare(&mut stack))
            .transpose()?;

        let mut task_definitions = BTreeMap::new();
        for role in ContainerRole::ALL {
            let task = match (role, &worker_task) {
                (ContainerRole::Worker, Some(worker)) => worker,
                _ => &primary,
            };
            task_definitions.insert(role, task.clone());
        }
        for task in [Some(&primary), worker_task.as_ref()].into_iter().flatten() {
            logger.log_component("task_definition", &task.resource.logical_id);
        }

        let mut services = vec![ServiceComposer::compose(
            &mut stack,
            &app_scope.child("AirflowService"),
            &cluster,
            &primary,
            &network,
            &ServiceKind::Public,
        )?];
        if let Some(worker) = &worker_task {
            services.push(ServiceComposer::compose(
                &mut stack,
                &app_scope.child("WorkerService"),
                &cluster,
                worker,
                &network,
                &ServiceKind::Worker(settings.worker_autoscaling.clone()),
            )?);
        }
        for composed in &services {
            logger.log_component("service", &composed.service.logical_id);
        }

        stack.add_output(
            &app_scope.child("AdminPassword"),
            Value::str(&admin_password),
            Some("Password of the Airflow admin user".to_string()),
        )?;
        logger.log_sensitive_output("AdminPassword");

        let on_demand_tasks =
            dag_tasks::build(&mut stack, &root.child("DagTasks"), &network, &settings.dag_tasks)?;
        logger.log_component("file_system", &on_demand_tasks.file_system.logical_id);

        stack.check_references()?;
        logger.log_stack_synthesized(&stack);
        if let Some(metrics) = &self.metrics {
            metrics.record_stack(&stack);
            metrics.observe_synthesis_latency(started.elapsed().as_secs_f64());
        }

        Ok(Assembly {
            stack,
            network,
            cluster,
            database,
            task_definitions,
            services,
            on_demand_tasks,
            environment: shared,
            admin_password,
        })
    }

    /// Assemble and hand the stack to `engine` in one step.
    pub async fn deploy(
        &self,
        engine: &dyn ProvisioningEngine,
    ) -> Result<(Assembly, ProvisioningReceipt)> {
        let assembly = self.assemble()?;
        let receipt = engine.provision(&assembly.stack).await?;
        Ok((assembly, receipt))
    }
}
