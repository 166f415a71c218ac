// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	panic::{AssertUnwindSafe, catch_unwind},
	path::{Path, PathBuf},
	sync::{
		Arc, Weak,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, unbounded};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::{Mutex, RwLock};
use switchyard_runtime::Timers;
use tracing::{debug, error, info, trace, warn};

use crate::{Debouncer, Result, WatchError, WatchEvent, WatchKind, WatcherConfig};

type Handler = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

struct Listener {
	id: u64,
	path: PathBuf,
	recursive: bool,
	kinds: Vec<WatchKind>,
	handler: Handler,
}

impl Listener {
	fn matches(&self, event: &WatchEvent) -> bool {
		if !self.kinds.contains(&event.kind) {
			return false;
		}
		if event.path == self.path {
			return true;
		}
		if self.recursive {
			event.path.starts_with(&self.path)
		} else {
			event.path.parent() == Some(self.path.as_path())
		}
	}
}

struct Inner {
	notify: Mutex<Option<RecommendedWatcher>>,
	watched: Mutex<HashMap<PathBuf, RecursiveMode>>,
	listeners: RwLock<Vec<Listener>>,
	next_id: AtomicU64,
	timers: Arc<Timers>,
	closed: AtomicBool,
}

impl Inner {
	fn dispatch(&self, event: WatchEvent) {
		let handlers: Vec<(u64, Handler)> = self
			.listeners
			.read()
			.iter()
			.filter(|l| l.matches(&event))
			.map(|l| (l.id, l.handler.clone()))
			.collect();

		trace!(path = %event.path.display(), kind = ?event.kind, listeners = handlers.len(), "dispatching");
		for (id, handler) in handlers {
			if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
				error!(listener = id, path = %event.path.display(), "watch handler panicked");
			}
		}

		if event.kind == WatchKind::Delete {
			self.purge(&event.path);
		}
	}

	/// Forgets every listener registered at or below a removed path.
	fn purge(&self, removed: &Path) {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|l| !l.path.starts_with(removed));
		let purged = before - listeners.len();
		drop(listeners);

		let stale: Vec<PathBuf> =
			self.watched.lock().keys().filter(|p| p.starts_with(removed)).cloned().collect();
		for path in stale {
			self.watched.lock().remove(&path);
			if let Some(notify) = self.notify.lock().as_mut() {
				// the kernel usually dropped the watch already
				let _ = notify.unwatch(&path);
			}
		}
		if purged > 0 {
			debug!(path = %removed.display(), purged = purged, "listeners purged after removal");
		}
	}

	fn ensure_watched(&self, target: &Path, mode: RecursiveMode) -> Result<()> {
		let mut watched = self.watched.lock();
		match watched.get(target) {
			Some(RecursiveMode::Recursive) => return Ok(()),
			Some(RecursiveMode::NonRecursive) if mode == RecursiveMode::NonRecursive => return Ok(()),
			_ => {}
		}

		let mut notify = self.notify.lock();
		let notify = notify.as_mut().ok_or(WatchError::Closed)?;
		notify.watch(target, mode).map_err(|source| WatchError::Notify {
			path: target.to_path_buf(),
			source,
		})?;
		watched.insert(target.to_path_buf(), mode);
		debug!(path = %target.display(), mode = ?mode, "watching");
		Ok(())
	}
}

/// Filesystem watcher with debounced, per-path dispatch.
#[derive(Clone)]
pub struct Watcher {
	inner: Arc<Inner>,
	debouncer: Debouncer,
	thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Watcher {
	pub fn new(config: WatcherConfig) -> Result<Self> {
		let (tx, rx) = unbounded();
		let notify = notify::recommended_watcher(move |event: notify::Result<Event>| {
			let _ = tx.send(event);
		})
		.map_err(|source| WatchError::Notify {
			path: PathBuf::new(),
			source,
		})?;

		let timers = Arc::new(Timers::new("watch-timer", config.timer_threads));
		let inner = Arc::new(Inner {
			notify: Mutex::new(Some(notify)),
			watched: Mutex::new(HashMap::new()),
			listeners: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(1),
			timers: timers.clone(),
			closed: AtomicBool::new(false),
		});

		let debouncer = Debouncer::new(timers, config.quiet_period, {
			let inner = Arc::downgrade(&inner);
			move |path, kind| {
				if let Some(inner) = inner.upgrade() {
					inner.dispatch(WatchEvent {
						path,
						kind,
					});
				}
			}
		});

		let thread = thread::Builder::new()
			.name("watch-listener".to_string())
			.spawn({
				let debouncer = debouncer.clone();
				move || listen(rx, debouncer)
			})
			.map_err(|source| WatchError::Spawn {
				name: "watch-listener".to_string(),
				source,
			})?;

		Ok(Self {
			inner,
			debouncer,
			thread: Arc::new(Mutex::new(Some(thread))),
		})
	}

	/// Calls `handler` for `kinds` events on `path`, or on its direct children
	/// when `path` is a directory.
	pub fn watch<F>(&self, path: impl AsRef<Path>, kinds: &[WatchKind], handler: F) -> Result<Subscription>
	where
		F: Fn(&WatchEvent) + Send + Sync + 'static,
	{
		self.subscribe(path.as_ref(), kinds, false, Arc::new(handler))
	}

	/// Like [`Watcher::watch`] but for every descendant of `path`.
	pub fn watch_recursive<F>(&self, path: impl AsRef<Path>, kinds: &[WatchKind], handler: F) -> Result<Subscription>
	where
		F: Fn(&WatchEvent) + Send + Sync + 'static,
	{
		self.subscribe(path.as_ref(), kinds, true, Arc::new(handler))
	}

	fn subscribe(&self, path: &Path, kinds: &[WatchKind], recursive: bool, handler: Handler) -> Result<Subscription> {
		if self.is_closed() {
			return Err(WatchError::Closed);
		}
		let path = std::path::absolute(path).map_err(|source| WatchError::Io {
			path: path.to_path_buf(),
			source,
		})?;

		let (target, mode) = if path.exists() {
			let mode = if recursive && path.is_dir() {
				RecursiveMode::Recursive
			} else {
				RecursiveMode::NonRecursive
			};
			(path.clone(), mode)
		} else {
			let ancestor = path
				.ancestors()
				.skip(1)
				.find(|a| a.exists())
				.ok_or_else(|| WatchError::NoExistingAncestor(path.clone()))?;
			debug!(path = %path.display(), ancestor = %ancestor.display(), "path missing, watching ancestor");
			(ancestor.to_path_buf(), RecursiveMode::NonRecursive)
		};
		self.inner.ensure_watched(&target, mode)?;

		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		self.inner.listeners.write().push(Listener {
			id,
			path,
			recursive,
			kinds: kinds.to_vec(),
			handler,
		});
		Ok(Subscription {
			id,
			inner: Arc::downgrade(&self.inner),
		})
	}

	pub fn listener_count(&self) -> usize {
		self.inner.listeners.read().len()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Stops the listener thread and the debounce timers. Pending dispatches are dropped.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		// dropping the notify watcher disconnects the listener channel
		self.inner.notify.lock().take();
		if let Some(thread) = self.thread.lock().take() {
			let _ = thread.join();
		}
		self.debouncer.cancel_all();
		self.inner.timers.shutdown();
		self.inner.listeners.write().clear();
		self.inner.watched.lock().clear();
		info!("watcher closed");
	}
}

fn listen(rx: Receiver<notify::Result<Event>>, debouncer: Debouncer) {
	debug!("watch listener started");
	for event in rx.iter() {
		let event = match event {
			Ok(event) => event,
			Err(e) => {
				warn!(error = %e, "watch error");
				continue;
			}
		};
		if event.need_rescan() {
			debug!("rescan notification dropped");
			continue;
		}
		let Some(kind) = WatchKind::from_notify(&event.kind) else {
			continue;
		};
		for path in event.paths {
			debouncer.submit(path, kind);
		}
	}
	debug!("watch listener stopped");
}

/// Handle to one registered listener.
#[derive(Debug)]
pub struct Subscription {
	id: u64,
	inner: Weak<Inner>,
}

impl Subscription {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Removes the listener. Returns false if it was already gone.
	pub fn cancel(&self) -> bool {
		let Some(inner) = self.inner.upgrade() else {
			return false;
		};
		let mut listeners = inner.listeners.write();
		let before = listeners.len();
		listeners.retain(|l| l.id != self.id);
		before != listeners.len()
	}
}
