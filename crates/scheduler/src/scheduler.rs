// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	any::Any,
	panic::{AssertUnwindSafe, catch_unwind},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Instant,
};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use switchyard_core::{ScriptError, ScriptId};
use tracing::{debug, error, info, warn};

use crate::{
	Completion, Result, SchedulerConfig, SchedulerError,
	completion::{self, Completer},
	gate::{Gate, GatePermit},
};

struct Inner {
	config: SchedulerConfig,
	pool: ThreadPool,
	gates: DashMap<ScriptId, Arc<Gate>>,
	closed: AtomicBool,
	in_flight: Mutex<usize>,
	drained: Condvar,
}

impl Inner {
	fn gate(&self, script: &ScriptId) -> Arc<Gate> {
		if let Some(gate) = self.gates.get(script) {
			return gate.value().clone();
		}
		self.gates.entry(script.clone()).or_insert_with(|| Arc::new(Gate::default())).value().clone()
	}

	fn finished(&self) {
		let mut in_flight = self.in_flight.lock();
		*in_flight -= 1;
		if *in_flight == 0 {
			self.drained.notify_all();
		}
	}
}

/// Dispatches script work onto a dedicated rayon pool.
#[derive(Clone)]
pub struct ScriptScheduler {
	inner: Arc<Inner>,
}

impl ScriptScheduler {
	pub fn new(config: SchedulerConfig) -> Result<Self> {
		let pool = ThreadPoolBuilder::new()
			.num_threads(config.threads.max(1))
			.thread_name(|i| format!("script-worker-{i}"))
			.build()
			.map_err(|e| SchedulerError::Pool(e.to_string()))?;

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				pool,
				gates: DashMap::new(),
				closed: AtomicBool::new(false),
				in_flight: Mutex::new(0),
				drained: Condvar::new(),
			}),
		})
	}

	/// Hands `work` to the pool.
	///
	/// With `serial` set the caller first takes the script's gate and blocks
	/// while a previous execution of the same script is still running.
	pub fn schedule<F>(&self, script: &ScriptId, serial: bool, work: F) -> Result<Completion>
	where
		F: FnOnce() -> std::result::Result<(), ScriptError> + Send + 'static,
	{
		self.ensure_open()?;

		let permit = if serial {
			Some(self.inner.gate(script).acquire().ok_or(SchedulerError::Closed)?)
		} else {
			None
		};
		// closed while waiting on the gate
		self.ensure_open()?;

		*self.inner.in_flight.lock() += 1;
		let (completer, completion) = completion::channel(script.clone());
		let inner = self.inner.clone();
		let id = script.clone();

		self.inner.pool.spawn(move || {
			run(&inner, &id, permit, completer, work);
			inner.finished();
		});

		Ok(completion)
	}

	pub fn in_flight(&self) -> usize {
		*self.inner.in_flight.lock()
	}

	pub fn threads(&self) -> usize {
		self.inner.pool.current_num_threads()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	/// Stops accepting work and waits for in-flight work to drain.
	///
	/// Work still queued when the pool reaches it is abandoned.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		for gate in self.inner.gates.iter() {
			gate.value().close();
		}

		let deadline = Instant::now() + self.inner.config.shutdown_timeout;
		let mut in_flight = self.inner.in_flight.lock();
		while *in_flight > 0 {
			if self.inner.drained.wait_until(&mut in_flight, deadline).timed_out() {
				break;
			}
		}
		if *in_flight > 0 {
			warn!(in_flight = *in_flight, "scheduler closed with work still running");
		} else {
			info!("scheduler closed");
		}
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(SchedulerError::Closed);
		}
		Ok(())
	}
}

fn run<F>(
	inner: &Inner,
	script: &ScriptId,
	permit: Option<GatePermit>,
	completer: Completer,
	work: F,
) where
	F: FnOnce() -> std::result::Result<(), ScriptError>,
{
	if inner.closed.load(Ordering::SeqCst) {
		debug!(script = %script, "work abandoned");
		return;
	}

	let result = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|panic| {
		let message = panic_message(panic.as_ref());
		error!(script = %script, panic = %message, "script work panicked");
		Err(ScriptError::Panicked {
			script: script.clone(),
			message,
		})
	});

	drop(permit);
	completer.complete(result);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}
