// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{sync::Arc, time::Duration};

use switchyard_cdc::{
	CdcError, Connector, ConnectorFactory, ConnectorManager, ConnectorProperties, Pipeline, PipelineConfig,
};
use switchyard_core::{SourceConfig, SystemConfig};
use switchyard_log::{EventLogConfig, LogRegistry};
use switchyard_scheduler::{SchedulerConfig, ScriptScheduler};
use switchyard_script::{RuntimeConfig, ScriptRuntime};
use switchyard_sink::{HttpSink, Sink};
use switchyard_sub_tracing::{TracingBuilder, TracingError, TracingFactory};
use switchyard_watch::{Watcher, WatcherConfig};
use tracing::{debug, warn};

use crate::{
	Error, Result, ScriptContainer, Switchyard,
	defaults::{PRUNE_INTERVAL, SINK_TIMEOUT},
};

pub struct SwitchyardBuilder {
	system: SystemConfig,
	sources: Vec<SourceConfig>,
	sink: Option<Arc<dyn Sink>>,
	sink_timeout: Duration,
	connectors: Arc<dyn ConnectorFactory>,
	runtime: RuntimeConfig,
	scheduler: SchedulerConfig,
	watcher: WatcherConfig,
	log: EventLogConfig,
	pipeline: PipelineConfig,
	prune_interval: Duration,
	tracing: Option<TracingFactory>,
}

impl SwitchyardBuilder {
	pub fn new(system: SystemConfig) -> Self {
		Self {
			system,
			sources: Vec::new(),
			sink: None,
			sink_timeout: SINK_TIMEOUT,
			connectors: Arc::new(NoConnectors),
			runtime: RuntimeConfig::default(),
			scheduler: SchedulerConfig::default(),
			watcher: WatcherConfig::default(),
			log: EventLogConfig::default(),
			pipeline: PipelineConfig::default(),
			prune_interval: PRUNE_INTERVAL,
			tracing: None,
		}
	}

	pub fn with_source(mut self, source: SourceConfig) -> Self {
		self.sources.push(source);
		self
	}

	pub fn with_sources(mut self, sources: impl IntoIterator<Item = SourceConfig>) -> Self {
		self.sources.extend(sources);
		self
	}

	/// Replaces the default HTTP sink.
	pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
		self.sink = Some(sink);
		self
	}

	pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
		self.sink_timeout = timeout;
		self
	}

	pub fn with_connector_factory(mut self, factory: Arc<dyn ConnectorFactory>) -> Self {
		self.connectors = factory;
		self
	}

	pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
		self.runtime = config;
		self
	}

	pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
		self.scheduler = config;
		self
	}

	pub fn with_threads(mut self, threads: usize) -> Self {
		self.scheduler = self.scheduler.threads(threads);
		self
	}

	pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
		self.watcher = config;
		self
	}

	pub fn with_log_config(mut self, config: EventLogConfig) -> Self {
		self.log = config;
		self
	}

	/// Per-script serial execution (the default) or unordered parallel execution.
	pub fn serial(mut self, serial: bool) -> Self {
		self.pipeline = self.pipeline.serial(serial);
		self
	}

	pub fn with_prune_interval(mut self, interval: Duration) -> Self {
		self.prune_interval = interval;
		self
	}

	/// Installs the global tracing subscriber during [`build`](Self::build),
	/// writing JSON lines to `logs/switchyard.log` under the runtime directory.
	pub fn with_tracing<F>(mut self, configurator: F) -> Self
	where
		F: FnOnce(TracingBuilder) -> TracingBuilder + Send + 'static,
	{
		self.tracing = Some(TracingFactory::with_configurator(configurator));
		self
	}

	pub fn build(self) -> Result<Switchyard> {
		self.system.create_directories().map_err(|source| Error::Io {
			path: self.system.runtime_directory.clone(),
			source,
		})?;

		if let Some(factory) = self.tracing {
			match factory.create(&self.system.log_directory()) {
				Ok(()) => {}
				Err(TracingError::AlreadyInitialized) => {
					warn!("tracing subscriber already installed, keeping it")
				}
				Err(e) => return Err(e.into()),
			}
		}

		for source in &self.sources {
			source.validate()?;
		}

		let sink: Arc<dyn Sink> = match self.sink {
			Some(sink) => sink,
			None => Arc::new(HttpSink::new(self.sink_timeout)?),
		};
		debug!(runtime = %self.system.runtime_directory.display(), sources = self.sources.len(), "building switchyard");

		let logs = Arc::new(LogRegistry::new(self.system.queue_directory(), self.log));
		let runtime = ScriptRuntime::new(self.runtime, sink)?;
		let scheduler = ScriptScheduler::new(self.scheduler)?;
		let watcher = Watcher::new(self.watcher)?;
		let pipeline = Pipeline::new(self.pipeline, logs, runtime.clone(), scheduler.clone());
		let connectors = ConnectorManager::new(pipeline.clone(), self.connectors, self.system.offset_directory());
		let container = ScriptContainer::new(self.system.script_directory(), runtime.clone(), pipeline.clone());

		Ok(Switchyard {
			config: self.system,
			sources: self.sources,
			runtime,
			scheduler,
			watcher,
			pipeline,
			connectors,
			container,
			prune_interval: self.prune_interval,
			maintenance: None,
			running: false,
			stopped: false,
		})
	}
}

/// Factory used when no change-capture connector is linked in.
struct NoConnectors;

impl ConnectorFactory for NoConnectors {
	fn create(&self, properties: &ConnectorProperties) -> switchyard_cdc::Result<Box<dyn Connector>> {
		Err(CdcError::Connector {
			name: properties.name().to_string(),
			message: "no connector factory configured".to_string(),
		})
	}
}
