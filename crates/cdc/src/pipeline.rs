// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use switchyard_core::{Interest, ScriptError, ScriptId, SourceConfig, SourceIdentity};
use switchyard_log::LogRegistry;
use switchyard_scheduler::ScriptScheduler;
use switchyard_script::ScriptRuntime;
use tracing::{debug, info, warn};

use crate::{CdcError, ReaderConfig, RecordHandler, Result, ScriptReader};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
	pub reader: ReaderConfig,
}

impl PipelineConfig {
	pub fn serial(mut self, serial: bool) -> Self {
		self.reader.serial = serial;
		self
	}
}

struct Source {
	config: SourceConfig,
	handler: RecordHandler,
}

struct Inner {
	config: PipelineConfig,
	logs: Arc<LogRegistry>,
	runtime: ScriptRuntime,
	scheduler: ScriptScheduler,
	sources: DashMap<SourceIdentity, Source>,
	// script -> generation of its current subscription
	subscribed: Mutex<BTreeMap<ScriptId, u64>>,
	generations: AtomicU64,
	readers: Mutex<BTreeMap<(ScriptId, SourceIdentity), ScriptReader>>,
	shutdown: AtomicBool,
}

/// Wires sources, their event logs and the scripts reading them.
///
/// A subscribed script gets one reader per attached source its interest
/// matches. Sources attached later are picked up by existing subscriptions.
#[derive(Clone)]
pub struct Pipeline {
	inner: Arc<Inner>,
}

impl Pipeline {
	pub fn new(
		config: PipelineConfig,
		logs: Arc<LogRegistry>,
		runtime: ScriptRuntime,
		scheduler: ScriptScheduler,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				config,
				logs,
				runtime,
				scheduler,
				sources: DashMap::new(),
				subscribed: Mutex::new(BTreeMap::new()),
				generations: AtomicU64::new(0),
				readers: Mutex::new(BTreeMap::new()),
				shutdown: AtomicBool::new(false),
			}),
		}
	}

	/// Opens the source's event log and starts readers for every subscribed
	/// script interested in it. Attaching the same source again returns the
	/// existing handler.
	pub fn attach_source(&self, config: &SourceConfig) -> Result<RecordHandler> {
		self.ensure_running()?;
		config.validate()?;
		let identity = config.identity();

		if let Some(source) = self.inner.sources.get(&identity) {
			return Ok(source.handler.clone());
		}

		let log = self.inner.logs.get_or_open(&identity)?;
		let handler = RecordHandler::new(identity.clone(), log);
		self.inner.sources.insert(
			identity.clone(),
			Source {
				config: config.clone(),
				handler: handler.clone(),
			},
		);
		info!(source = %identity, name = %config.name, "source attached");

		let scripts: Vec<ScriptId> = self.inner.subscribed.lock().keys().cloned().collect();
		for script in scripts {
			let Some(interest) = self.inner.runtime.interest(&script) else {
				continue;
			};
			if interest.matches_source(config) {
				self.start_reader(&script, &identity, interest, &handler)?;
			}
		}
		Ok(handler)
	}

	pub fn handler(&self, identity: &SourceIdentity) -> Option<RecordHandler> {
		self.inner.sources.get(identity).map(|s| s.handler.clone())
	}

	/// Starts readers for `script` on every attached source matching its
	/// declared interest. Returns how many readers are running for it.
	pub fn subscribe(&self, script: &ScriptId) -> Result<usize> {
		self.ensure_running()?;
		let interest = self.inner.runtime.interest(script).ok_or_else(|| {
			CdcError::Script(ScriptError::NotRegistered {
				script: script.clone(),
			})
		})?;
		let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
		self.inner.subscribed.lock().insert(script.clone(), generation);

		let sources: Vec<(SourceIdentity, SourceConfig, RecordHandler)> = self
			.inner
			.sources
			.iter()
			.map(|e| (e.key().clone(), e.value().config.clone(), e.value().handler.clone()))
			.collect();

		let mut started = 0;
		for (identity, config, handler) in sources {
			if !interest.matches_source(&config) {
				debug!(script = %script, source = %identity, "source outside script interest");
				continue;
			}
			self.start_reader(script, &identity, interest.clone(), &handler)?;
			started += 1;
		}
		info!(script = %script, readers = started, "script subscribed");
		Ok(started)
	}

	/// Stops every reader of `script`. Its cursors stay persisted.
	pub fn unsubscribe(&self, script: &ScriptId) -> usize {
		self.inner.subscribed.lock().remove(script);
		let stopped = self.stop_readers(|(s, _)| s == script);
		if stopped > 0 {
			info!(script = %script, readers = stopped, "script unsubscribed");
		}
		stopped
	}

	/// Restarts `script`'s readers so they pick up a changed interest.
	pub fn resubscribe(&self, script: &ScriptId) -> Result<usize> {
		self.unsubscribe(script);
		self.subscribe(script)
	}

	pub fn is_subscribed(&self, script: &ScriptId) -> bool {
		self.inner.subscribed.lock().contains_key(script)
	}

	/// Generation of the script's current subscription. Every subscribe,
	/// including the one inside [`resubscribe`](Self::resubscribe), yields a
	/// larger value.
	pub fn subscription(&self, script: &ScriptId) -> Option<u64> {
		self.inner.subscribed.lock().get(script).copied()
	}

	pub fn readers_of(&self, script: &ScriptId) -> usize {
		self.inner.readers.lock().keys().filter(|(s, _)| s == script).count()
	}

	pub fn reader_count(&self) -> usize {
		self.inner.readers.lock().len()
	}

	pub fn sources(&self) -> Vec<SourceIdentity> {
		self.inner.sources.iter().map(|e| e.key().clone()).collect()
	}

	pub fn logs(&self) -> &Arc<LogRegistry> {
		&self.inner.logs
	}

	/// Deletes event log segments every cursor has consumed.
	pub fn prune(&self) -> Result<usize> {
		Ok(self.inner.logs.prune_all()?)
	}

	/// Stops every reader. Later calls to attach or subscribe fail.
	pub fn shutdown(&self) {
		if self.inner.shutdown.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.subscribed.lock().clear();
		let stopped = self.stop_readers(|_| true);
		info!(readers = stopped, "change pipeline shut down");
	}

	fn start_reader(
		&self,
		script: &ScriptId,
		identity: &SourceIdentity,
		interest: Interest,
		handler: &RecordHandler,
	) -> Result<()> {
		let mut readers = self.inner.readers.lock();
		let key = (script.clone(), identity.clone());
		if readers.contains_key(&key) {
			return Ok(());
		}
		let reader = ScriptReader::spawn(
			script.clone(),
			identity.clone(),
			interest,
			handler.log().clone(),
			self.inner.runtime.clone(),
			self.inner.scheduler.clone(),
			self.inner.config.reader.clone(),
		)?;
		readers.insert(key, reader);
		Ok(())
	}

	fn stop_readers(&self, matches: impl Fn(&(ScriptId, SourceIdentity)) -> bool) -> usize {
		let stopping: Vec<ScriptReader> = {
			let mut readers = self.inner.readers.lock();
			let keys: Vec<_> = readers.keys().filter(|k| matches(k)).cloned().collect();
			keys.into_iter().filter_map(|k| readers.remove(&k)).collect()
		};
		let count = stopping.len();
		for reader in &stopping {
			reader.cancel();
		}
		for mut reader in stopping {
			reader.stop();
			if reader.is_running() {
				warn!(script = %reader.script(), source = %reader.source(), "reader did not stop");
			}
		}
		count
	}

	fn ensure_running(&self) -> Result<()> {
		if self.inner.shutdown.load(Ordering::SeqCst) {
			return Err(CdcError::Shutdown);
		}
		Ok(())
	}
}
