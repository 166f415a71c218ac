// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use switchyard_cdc::{CdcError, ConnectorManager, Pipeline};
use switchyard_core::{SourceConfig, SystemConfig};
use switchyard_runtime::Timers;
use switchyard_scheduler::ScriptScheduler;
use switchyard_script::ScriptRuntime;
use switchyard_watch::Watcher;
use tracing::{debug, error, info, warn};

use crate::{Result, ScriptContainer};

/// A running change pipeline: connectors feed per-source event logs, which
/// the scripts in the script directory consume.
pub struct Switchyard {
	pub(crate) config: SystemConfig,
	pub(crate) sources: Vec<SourceConfig>,
	pub(crate) runtime: ScriptRuntime,
	pub(crate) scheduler: ScriptScheduler,
	pub(crate) watcher: Watcher,
	pub(crate) pipeline: Pipeline,
	pub(crate) connectors: ConnectorManager,
	pub(crate) container: ScriptContainer,
	pub(crate) prune_interval: Duration,
	pub(crate) maintenance: Option<Timers>,
	pub(crate) running: bool,
	pub(crate) stopped: bool,
}

impl Switchyard {
	pub fn config(&self) -> &SystemConfig {
		&self.config
	}

	pub fn runtime(&self) -> &ScriptRuntime {
		&self.runtime
	}

	pub fn scheduler(&self) -> &ScriptScheduler {
		&self.scheduler
	}

	pub fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	pub fn connectors(&self) -> &ConnectorManager {
		&self.connectors
	}

	pub fn container(&self) -> &ScriptContainer {
		&self.container
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	/// Loads and follows the script directory, then starts every configured source.
	pub fn start(&mut self) -> Result<()> {
		if self.stopped {
			return Err(CdcError::Shutdown.into());
		}
		if self.running {
			return Ok(());
		}
		self.container.start(&self.watcher)?;
		self.running = true;

		let failed = self.sources.iter().find_map(|source| self.connectors.run(source).err().map(|e| (source, e)));
		if let Some((source, e)) = failed {
			error!(source = %source.name, error = %e, "failed to start source");
			self.shutdown();
			return Err(e.into());
		}

		let maintenance = Timers::new("switchyard-maintenance", 1);
		let pipeline = self.pipeline.clone();
		maintenance.schedule_repeat(self.prune_interval, move || {
			match pipeline.prune() {
				Ok(0) => {}
				Ok(removed) => debug!(segments = removed, "pruned consumed segments"),
				Err(e) => warn!(error = %e, "failed to prune event logs"),
			}
			true
		});
		self.maintenance = Some(maintenance);

		info!(
			runtime = %self.config.runtime_directory.display(),
			scripts = self.container.scripts().len(),
			sources = self.sources.len(),
			"switchyard started"
		);
		Ok(())
	}

	/// Starts capturing an additional source. Returns `false` when the same
	/// database instance is already being captured.
	pub fn add_source(&mut self, source: SourceConfig) -> Result<bool> {
		let started = self.connectors.run(&source)?;
		if started {
			self.sources.push(source);
		}
		Ok(started)
	}

	/// Stops the connectors first. Running scripts are interrupted and the
	/// scheduler drained before readers stop, so a stuck script cannot hold
	/// shutdown up. Records in flight stay uncommitted.
	pub fn shutdown(&mut self) {
		if self.stopped {
			return;
		}
		self.stopped = true;
		self.running = false;
		debug!("shutting down switchyard");

		if let Some(maintenance) = self.maintenance.take() {
			maintenance.shutdown();
		}
		self.connectors.shutdown();
		self.runtime.shutdown();
		self.scheduler.close();
		self.container.stop();
		self.pipeline.shutdown();
		self.watcher.close();
		info!("switchyard stopped");
	}
}

impl Drop for Switchyard {
	fn drop(&mut self) {
		if self.running {
			warn!("switchyard dropped while running, shutting down");
		}
		self.shutdown();
	}
}
