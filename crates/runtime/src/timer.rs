// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Timer service.
//!
//! Deadlines are tracked on a single coordinator thread in a min-heap. Due
//! callbacks are dispatched onto a small rayon pool so a slow callback never
//! delays other timers. Cancellation is a shared flag checked right before a
//! callback runs.

use std::{
	cmp::Ordering as CmpOrdering,
	collections::BinaryHeap,
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicU64, Ordering},
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error};

/// Handle to a scheduled timer. Clones refer to the same timer.
#[derive(Clone)]
pub struct TimerHandle {
	id: u64,
	cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
	fn new(id: u64) -> Self {
		Self {
			id,
			cancelled: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Returns `true` if this call cancelled the timer.
	pub fn cancel(&self) -> bool {
		self.cancelled.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::SeqCst)
	}

	pub fn id(&self) -> u64 {
		self.id
	}
}

impl std::fmt::Debug for TimerHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TimerHandle").field("id", &self.id).field("cancelled", &self.is_cancelled()).finish()
	}
}

type OnceFn = Box<dyn FnOnce() + Send>;
type RepeatFn = Arc<dyn Fn() -> bool + Send + Sync>;

enum Action {
	Once(OnceFn),
	Repeat {
		callback: RepeatFn,
		interval: Duration,
	},
}

struct Pending {
	id: u64,
	deadline: Instant,
	action: Action,
	cancelled: Arc<AtomicBool>,
}

impl Eq for Pending {}

impl PartialEq for Pending {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.id == other.id
	}
}

impl Ord for Pending {
	// earliest deadline on top of the max-heap
	fn cmp(&self, other: &Self) -> CmpOrdering {
		other.deadline.cmp(&self.deadline).then_with(|| other.id.cmp(&self.id))
	}
}

impl PartialOrd for Pending {
	fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
		Some(self.cmp(other))
	}
}

enum Command {
	Schedule(Pending),
	Shutdown,
}

/// One-shot and repeating timers.
pub struct Timers {
	commands: Sender<Command>,
	next_id: AtomicU64,
	coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Timers {
	/// Starts the coordinator thread and a callback pool with `threads` workers.
	pub fn new(name: &str, threads: usize) -> Self {
		let pool = ThreadPoolBuilder::new()
			.num_threads(threads.max(1))
			.thread_name({
				let name = name.to_string();
				move |i| format!("{}-{}", name, i)
			})
			.panic_handler(|_| error!("timer callback panicked"))
			.build()
			.expect("failed to build timer pool");

		let (commands, rx) = unbounded();
		let coordinator = thread::Builder::new()
			.name(format!("{}-coordinator", name))
			.spawn(move || run(rx, pool))
			.expect("failed to spawn timer coordinator thread");

		Self {
			commands,
			next_id: AtomicU64::new(1),
			coordinator: Mutex::new(Some(coordinator)),
		}
	}

	/// Runs `callback` once after `delay`.
	pub fn schedule_once<F>(&self, delay: Duration, callback: F) -> TimerHandle
	where
		F: FnOnce() + Send + 'static,
	{
		self.submit(delay, Action::Once(Box::new(callback)))
	}

	/// Runs `callback` every `interval` until it returns `false` or the timer is cancelled.
	pub fn schedule_repeat<F>(&self, interval: Duration, callback: F) -> TimerHandle
	where
		F: Fn() -> bool + Send + Sync + 'static,
	{
		self.submit(
			interval,
			Action::Repeat {
				callback: Arc::new(callback),
				interval,
			},
		)
	}

	fn submit(&self, delay: Duration, action: Action) -> TimerHandle {
		let handle = TimerHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed));
		let pending = Pending {
			id: handle.id,
			deadline: Instant::now() + delay,
			action,
			cancelled: handle.cancelled.clone(),
		};
		if self.commands.send(Command::Schedule(pending)).is_err() {
			debug!(timer = handle.id, "timer scheduled after shutdown");
			handle.cancel();
		}
		handle
	}

	/// Stops the coordinator. Timers that have not fired are dropped.
	pub fn shutdown(&self) {
		let _ = self.commands.send(Command::Shutdown);
		if let Some(coordinator) = self.coordinator.lock().take() {
			let _ = coordinator.join();
		}
	}
}

impl Drop for Timers {
	fn drop(&mut self) {
		let _ = self.commands.send(Command::Shutdown);
	}
}

fn run(rx: Receiver<Command>, pool: ThreadPool) {
	let mut heap: BinaryHeap<Pending> = BinaryHeap::new();

	loop {
		let next = heap.peek().map(|p| p.deadline.saturating_duration_since(Instant::now()));

		let command = match next {
			Some(wait) if wait.is_zero() => match rx.try_recv() {
				Ok(command) => Some(command),
				Err(TryRecvError::Empty) => None,
				Err(TryRecvError::Disconnected) => return,
			},
			Some(wait) => match rx.recv_timeout(wait) {
				Ok(command) => Some(command),
				Err(RecvTimeoutError::Timeout) => None,
				Err(RecvTimeoutError::Disconnected) => return,
			},
			None => match rx.recv() {
				Ok(command) => Some(command),
				Err(_) => return,
			},
		};

		match command {
			Some(Command::Schedule(pending)) => heap.push(pending),
			Some(Command::Shutdown) => return,
			None => {}
		}

		fire_due(&mut heap, &pool);
	}
}

fn fire_due(heap: &mut BinaryHeap<Pending>, pool: &ThreadPool) {
	let now = Instant::now();
	while heap.peek().is_some_and(|top| top.deadline <= now) {
		let Some(pending) = heap.pop() else {
			break;
		};
		if pending.cancelled.load(Ordering::SeqCst) {
			continue;
		}

		match pending.action {
			Action::Once(callback) => {
				let cancelled = pending.cancelled;
				pool.spawn(move || {
					if !cancelled.load(Ordering::SeqCst) {
						callback();
					}
				});
			}
			Action::Repeat {
				callback,
				interval,
			} => {
				let cancelled = pending.cancelled.clone();
				let tick = callback.clone();
				pool.spawn(move || {
					if !cancelled.load(Ordering::SeqCst) && !tick() {
						cancelled.store(true, Ordering::SeqCst);
					}
				});
				heap.push(Pending {
					id: pending.id,
					deadline: now + interval,
					action: Action::Repeat {
						callback,
						interval,
					},
					cancelled: pending.cancelled,
				});
			}
		}
	}
}
