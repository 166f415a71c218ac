// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use parking_lot::Mutex;
use switchyard_runtime::{TimerHandle, Timers};
use tracing::trace;

use crate::WatchKind;

type Dispatch = dyn Fn(PathBuf, WatchKind) + Send + Sync;

struct Inner {
	timers: Arc<Timers>,
	quiet_period: Duration,
	dispatch: Box<Dispatch>,
	pending: Mutex<HashMap<PathBuf, (u64, TimerHandle)>>,
	seq: AtomicU64,
}

/// Collapses bursts of events per path.
///
/// Each submission cancels the path's pending timer and starts a new one, so
/// only the latest kind is dispatched once the path has been quiet for the
/// whole period.
#[derive(Clone)]
pub struct Debouncer {
	inner: Arc<Inner>,
}

impl Debouncer {
	pub fn new<F>(timers: Arc<Timers>, quiet_period: Duration, dispatch: F) -> Self
	where
		F: Fn(PathBuf, WatchKind) + Send + Sync + 'static,
	{
		Self {
			inner: Arc::new(Inner {
				timers,
				quiet_period,
				dispatch: Box::new(dispatch),
				pending: Mutex::new(HashMap::new()),
				seq: AtomicU64::new(0),
			}),
		}
	}

	pub fn submit(&self, path: PathBuf, kind: WatchKind) {
		let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
		let mut pending = self.inner.pending.lock();
		if let Some((_, previous)) = pending.remove(&path) {
			previous.cancel();
			trace!(path = %path.display(), "debounce timer replaced");
		}

		let inner = Arc::downgrade(&self.inner);
		let key = path.clone();
		let handle = self.inner.timers.schedule_once(self.inner.quiet_period, move || {
			let Some(inner) = inner.upgrade() else {
				return;
			};
			{
				let mut pending = inner.pending.lock();
				match pending.get(&path) {
					Some((current, _)) if *current == seq => {
						pending.remove(&path);
					}
					// superseded by a later event
					_ => return,
				}
			}
			(inner.dispatch)(path, kind);
		});
		pending.insert(key, (seq, handle));
	}

	/// Paths with a dispatch still pending.
	pub fn pending(&self) -> usize {
		self.inner.pending.lock().len()
	}

	pub fn cancel_all(&self) {
		for (_, (_, handle)) in self.inner.pending.lock().drain() {
			handle.cancel();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::thread;

	use switchyard_testing::wait_for;

	use super::*;

	fn debouncer(quiet: Duration) -> (Debouncer, Arc<Mutex<Vec<(PathBuf, WatchKind)>>>) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let timers = Arc::new(Timers::new("debounce-test", 1));
		let debouncer = Debouncer::new(timers, quiet, {
			let seen = seen.clone();
			move |path, kind| seen.lock().push((path, kind))
		});
		(debouncer, seen)
	}

	#[test]
	fn test_burst_dispatches_once_with_latest_kind() {
		let (debouncer, seen) = debouncer(Duration::from_millis(100));
		let path = PathBuf::from("/scripts/orders.js");

		debouncer.submit(path.clone(), WatchKind::Create);
		debouncer.submit(path.clone(), WatchKind::Modify);
		debouncer.submit(path.clone(), WatchKind::Modify);

		wait_for(|| !seen.lock().is_empty(), "debounced dispatch");
		thread::sleep(Duration::from_millis(200));
		assert_eq!(*seen.lock(), vec![(path, WatchKind::Modify)]);
		assert_eq!(debouncer.pending(), 0);
	}

	#[test]
	fn test_paths_are_debounced_independently() {
		let (debouncer, seen) = debouncer(Duration::from_millis(50));

		debouncer.submit(PathBuf::from("/a"), WatchKind::Modify);
		debouncer.submit(PathBuf::from("/b"), WatchKind::Delete);

		wait_for(|| seen.lock().len() == 2, "both paths dispatched");
		let mut seen = seen.lock().clone();
		seen.sort_by(|a, b| a.0.cmp(&b.0));
		assert_eq!(seen, vec![(PathBuf::from("/a"), WatchKind::Modify), (PathBuf::from("/b"), WatchKind::Delete)]);
	}

	#[test]
	fn test_cancel_all_drops_pending() {
		let (debouncer, seen) = debouncer(Duration::from_millis(50));
		debouncer.submit(PathBuf::from("/a"), WatchKind::Modify);
		debouncer.cancel_all();

		thread::sleep(Duration::from_millis(150));
		assert!(seen.lock().is_empty());
	}
}
