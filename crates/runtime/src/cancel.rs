// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use parking_lot::{Condvar, Mutex};

/// A cancellation token for signaling shutdown to worker threads.
///
/// Clones share the same state. Besides polling [`is_cancelled`], a thread
/// can park on [`wait_timeout`] and is woken as soon as [`cancel`] is called.
///
/// [`is_cancelled`]: CancellationToken::is_cancelled
/// [`wait_timeout`]: CancellationToken::wait_timeout
/// [`cancel`]: CancellationToken::cancel
#[derive(Clone)]
pub struct CancellationToken {
	inner: Arc<Inner>,
}

struct Inner {
	cancelled: AtomicBool,
	lock: Mutex<()>,
	condvar: Condvar,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				cancelled: AtomicBool::new(false),
				lock: Mutex::new(()),
				condvar: Condvar::new(),
			}),
		}
	}

	pub fn cancel(&self) {
		let _guard = self.inner.lock.lock();
		self.inner.cancelled.store(true, Ordering::SeqCst);
		self.inner.condvar.notify_all();
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Parks until cancelled or the timeout elapses. Returns `true` if cancelled.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		let mut guard = self.inner.lock.lock();
		if self.is_cancelled() {
			return true;
		}
		let _ = self.inner.condvar.wait_for(&mut guard, timeout);
		self.is_cancelled()
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for CancellationToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CancellationToken").field("cancelled", &self.is_cancelled()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::{thread, time::Instant};

	use super::*;

	#[test]
	fn test_clones_share_state() {
		let token = CancellationToken::new();
		let clone = token.clone();
		assert!(!clone.is_cancelled());
		token.cancel();
		assert!(clone.is_cancelled());
	}

	#[test]
	fn test_wait_timeout_wakes_on_cancel() {
		let token = CancellationToken::new();
		let clone = token.clone();

		let start = Instant::now();
		let waiter = thread::spawn(move || clone.wait_timeout(Duration::from_secs(10)));
		thread::sleep(Duration::from_millis(20));
		token.cancel();

		assert!(waiter.join().unwrap());
		assert!(start.elapsed() < Duration::from_secs(5));
	}

	#[test]
	fn test_wait_timeout_expires() {
		let token = CancellationToken::new();
		assert!(!token.wait_timeout(Duration::from_millis(5)));
	}
}
