// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod discovery;

use std::{
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	thread::{self, JoinHandle},
};

use crossbeam_channel::{Sender, unbounded};
pub use discovery::{ScriptEntry, discover, locate, resolve};
use parking_lot::Mutex;
use switchyard_cdc::Pipeline;
use switchyard_core::ScriptId;
use switchyard_script::ScriptRuntime;
use switchyard_watch::{Subscription, WatchKind, Watcher};
use tracing::{debug, error, info};

use crate::{Error, Result};

struct Inner {
	directory: PathBuf,
	runtime: ScriptRuntime,
	pipeline: Pipeline,
	applying: Mutex<()>,
}

// `None` stops the worker
struct Worker {
	changes: Sender<Option<PathBuf>>,
	thread: JoinHandle<()>,
}

/// Keeps the registered scripts in step with the script directory.
///
/// New scripts are registered and subscribed, changed ones are recompiled and
/// resubscribed, and removed ones are unsubscribed and unregistered. A script
/// that fails to compile is logged; a previously loaded version keeps running.
///
/// Watch events are queued to the `script-container` thread and applied one
/// at a time, off the watcher's callback pool.
pub struct ScriptContainer {
	inner: Arc<Inner>,
	subscription: Mutex<Option<Subscription>>,
	worker: Mutex<Option<Worker>>,
}

impl ScriptContainer {
	pub fn new(directory: impl Into<PathBuf>, runtime: ScriptRuntime, pipeline: Pipeline) -> Self {
		let directory = directory.into();
		let directory = std::path::absolute(&directory).unwrap_or(directory);
		Self {
			inner: Arc::new(Inner {
				directory,
				runtime,
				pipeline,
				applying: Mutex::new(()),
			}),
			subscription: Mutex::new(None),
			worker: Mutex::new(None),
		}
	}

	pub fn directory(&self) -> &Path {
		&self.inner.directory
	}

	/// Watches the script directory, then loads every script already in it.
	/// Returns how many scripts loaded.
	pub fn start(&self, watcher: &Watcher) -> Result<usize> {
		let directory = &self.inner.directory;
		fs::create_dir_all(directory).map_err(|source| Error::Io {
			path: directory.clone(),
			source,
		})?;

		let changes = self.spawn_worker()?;
		let subscription = watcher.watch_recursive(directory, &WatchKind::ALL, move |event| {
			let _ = changes.send(Some(event.path.clone()));
		})?;
		if let Some(previous) = self.subscription.lock().replace(subscription) {
			previous.cancel();
		}

		let entries = discover(directory).map_err(|source| Error::Io {
			path: directory.clone(),
			source,
		})?;
		let _applying = self.inner.applying.lock();
		let loaded = entries.iter().filter(|entry| self.inner.load(&entry.id, &entry.path)).count();
		info!(directory = %directory.display(), scripts = loaded, "script container started");
		Ok(loaded)
	}

	/// Applies a change to `path` immediately.
	pub fn refresh(&self, path: &Path) {
		self.inner.refresh(path);
	}

	pub fn scripts(&self) -> Vec<ScriptId> {
		self.inner.runtime.scripts()
	}

	/// Stops following the directory and waits for the change being applied.
	/// Loaded scripts stay registered.
	pub fn stop(&self) {
		if let Some(subscription) = self.subscription.lock().take() {
			subscription.cancel();
		}
		if let Some(worker) = self.worker.lock().take() {
			let _ = worker.changes.send(None);
			if worker.thread.join().is_err() {
				error!("script container thread panicked");
			}
		}
	}

	fn spawn_worker(&self) -> Result<Sender<Option<PathBuf>>> {
		let mut worker = self.worker.lock();
		if let Some(worker) = worker.as_ref() {
			return Ok(worker.changes.clone());
		}

		let (changes, rx) = unbounded::<Option<PathBuf>>();
		let inner = Arc::downgrade(&self.inner);
		let thread = thread::Builder::new()
			.name("script-container".to_string())
			.spawn(move || {
				while let Ok(Some(path)) = rx.recv() {
					let Some(inner) = inner.upgrade() else {
						break;
					};
					inner.refresh(&path);
				}
				debug!("script container thread stopped");
			})
			.map_err(|source| Error::Spawn {
				name: "script-container".to_string(),
				source,
			})?;

		*worker = Some(Worker {
			changes: changes.clone(),
			thread,
		});
		Ok(changes)
	}
}

impl Inner {
	fn refresh(&self, path: &Path) {
		let Some(script) = locate(&self.directory, path) else {
			debug!(path = %path.display(), "ignoring change outside any script");
			return;
		};
		let _applying = self.applying.lock();
		match resolve(&self.directory, &script) {
			Some(entry) => {
				self.load(&script, &entry);
			}
			None => self.unload(&script),
		}
	}

	fn load(&self, script: &ScriptId, path: &Path) -> bool {
		let loaded = self.runtime.path(script).is_some();
		if let Err(e) = self.runtime.register(script, path) {
			if loaded {
				error!(script = %script, path = %path.display(), error = %e, "reload failed, keeping previous version");
			} else {
				error!(script = %script, path = %path.display(), error = %e, "script failed to load");
			}
			return false;
		}

		let subscribed = if loaded {
			self.pipeline.resubscribe(script)
		} else {
			self.pipeline.subscribe(script)
		};
		match subscribed {
			Ok(readers) => {
				info!(script = %script, readers = readers, reloaded = loaded, "script loaded");
				true
			}
			Err(e) => {
				error!(script = %script, error = %e, "failed to subscribe script");
				false
			}
		}
	}

	fn unload(&self, script: &ScriptId) {
		if self.runtime.path(script).is_none() {
			return;
		}
		self.pipeline.unsubscribe(script);
		self.runtime.unregister(script);
		info!(script = %script, "script unloaded");
	}
}

impl Drop for ScriptContainer {
	fn drop(&mut self) {
		self.stop();
	}
}
