use super::Supervisor;
use crate::config::{DaemonConfig, ServiceLoader};
use crate::error::Result;
use crate::liveness::Prober;
use crate::service::{Registry, ServiceDefinition};
use crate::supervisor::{NativeProcessOps, ProcessOps, ProcessSupervisor};
use std::sync::Arc;

/// Builder for constructing a [`Supervisor`] with a fluent API.
///
/// # Example
///
/// ```
/// use warden::service::{ServiceDefinition, ServiceKind};
/// use warden::Supervisor;
///
/// # fn example() -> Result<(), warden::Error> {
/// let supervisor = Supervisor::builder()
///     .definition(ServiceDefinition::new("net", ServiceKind::Oneshot, "true"))
///     .build()?;
/// assert_eq!(supervisor.registry().len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SupervisorBuilder {
    config: Option<DaemonConfig>,
    ops: Option<Arc<dyn ProcessOps>>,
    definitions: Vec<ServiceDefinition>,
    load_services: bool,
}

impl SupervisorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            ops: None,
            definitions: Vec::new(),
            load_services: false,
        }
    }

    /// Set the daemon settings. Defaults to [`DaemonConfig::default`].
    pub fn config(mut self, config: DaemonConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the OS process layer, mostly useful in tests.
    pub fn process_ops(mut self, ops: Arc<dyn ProcessOps>) -> Self {
        self.ops = Some(ops);
        self
    }

    /// Add a definition to the initial registry.
    pub fn definition(mut self, definition: ServiceDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn definitions(mut self, definitions: impl IntoIterator<Item = ServiceDefinition>) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Load `services_dir` at build time and on every `reload`.
    pub fn load_services(mut self, load: bool) -> Self {
        self.load_services = load;
        self
    }

    /// Build the supervisor.
    ///
    /// Fails only when the settings are invalid or the services directory
    /// cannot be read; broken definition files are logged and skipped.
    pub fn build(self) -> Result<Arc<Supervisor>> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut definitions = self.definitions;
        let loader = if self.load_services {
            let loader = ServiceLoader::new(&config.services_dir);
            let report = loader.load()?;
            if !report.failures.is_empty() {
                tracing::warn!(
                    "{} service definition(s) in {} were skipped",
                    report.failures.len(),
                    loader.dir().display()
                );
            }
            definitions.extend(report.definitions);
            Some(loader)
        } else {
            None
        };

        let ops = self.ops.unwrap_or_else(|| Arc::new(NativeProcessOps));
        let registry = Arc::new(Registry::from_definitions(definitions));
        tracing::info!("Loaded {} service(s)", registry.len());

        Ok(Arc::new(Supervisor::from_parts(
            registry,
            ProcessSupervisor::new(Arc::clone(&ops)),
            Prober::new(ops),
            config,
            loader,
        )))
    }
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
