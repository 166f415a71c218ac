// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::Arc,
	thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use switchyard_core::{SourceConfig, SourceIdentity};
use switchyard_runtime::CancellationToken;
use tracing::{error, info, warn};

use crate::{CdcError, ConnectorFactory, ConnectorProperties, Pipeline, RecordHandler, Result};

struct Running {
	name: String,
	cancel: CancellationToken,
	thread: JoinHandle<()>,
}

/// Runs one connector thread per source.
pub struct ConnectorManager {
	pipeline: Pipeline,
	factory: Arc<dyn ConnectorFactory>,
	offset_dir: PathBuf,
	running: Mutex<HashMap<SourceIdentity, Running>>,
}

impl ConnectorManager {
	pub fn new(pipeline: Pipeline, factory: Arc<dyn ConnectorFactory>, offset_dir: impl Into<PathBuf>) -> Self {
		Self {
			pipeline,
			factory,
			offset_dir: offset_dir.into(),
			running: Mutex::new(HashMap::new()),
		}
	}

	/// Starts capturing `source`. Returns `false` when a connector for the
	/// same identity is already running.
	pub fn run(&self, source: &SourceConfig) -> Result<bool> {
		let properties = ConnectorProperties::for_source(source, &self.offset_dir)?;
		let identity = source.identity();

		let mut running = self.running.lock();
		if running.contains_key(&identity) {
			return Ok(false);
		}

		let handler = self.pipeline.attach_source(source)?;
		let mut connector = self.factory.create(&properties)?;
		let name = properties.name().to_string();
		let cancel = CancellationToken::new();

		let thread_name = format!("connector-{}", name);
		let thread = thread::Builder::new()
			.name(thread_name.clone())
			.spawn({
				let name = name.clone();
				let cancel = cancel.clone();
				move || {
					info!(connector = %name, source = %handler.identity(), "connector started");
					let mut emit = |raw: Option<&str>| deliver(&handler, &name, raw);
					match connector.run(&mut emit, &cancel) {
						Ok(()) => info!(connector = %name, "connector stopped"),
						Err(e) => error!(connector = %name, error = %e, "connector failed"),
					}
				}
			})
			.map_err(|source| CdcError::Spawn {
				name: thread_name,
				source,
			})?;

		running.insert(
			identity,
			Running {
				name,
				cancel,
				thread,
			},
		);
		Ok(true)
	}

	pub fn is_running(&self, identity: &SourceIdentity) -> bool {
		self.running.lock().get(identity).is_some_and(|r| !r.thread.is_finished())
	}

	pub fn connectors(&self) -> Vec<String> {
		self.running.lock().values().map(|r| r.name.clone()).collect()
	}

	/// Cancels one source's connector and waits for it.
	pub fn stop(&self, identity: &SourceIdentity) -> bool {
		let Some(running) = self.running.lock().remove(identity) else {
			return false;
		};
		join(running);
		true
	}

	/// Cancels every connector and waits for all of them.
	pub fn shutdown(&self) {
		let running: Vec<Running> = self.running.lock().drain().map(|(_, r)| r).collect();
		for r in &running {
			r.cancel.cancel();
		}
		for r in running {
			join(r);
		}
	}
}

fn deliver(handler: &RecordHandler, connector: &str, raw: Option<&str>) {
	if let Err(e) = handler.handle(raw) {
		error!(connector = %connector, source = %handler.identity(), error = %e, "failed to store change event");
	}
}

fn join(running: Running) {
	running.cancel.cancel();
	if running.thread.join().is_err() {
		warn!(connector = %running.name, "connector thread panicked");
	}
}

impl Drop for ConnectorManager {
	fn drop(&mut self) {
		self.shutdown();
	}
}
