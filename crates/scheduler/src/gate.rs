// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct State {
	held: bool,
	closed: bool,
}

/// Binary gate serialising one script's executions.
#[derive(Default)]
pub(crate) struct Gate {
	state: Mutex<State>,
	released: Condvar,
}

impl Gate {
	/// Blocks until the gate is free and takes it. `None` once the gate is closed.
	pub(crate) fn acquire(self: &Arc<Self>) -> Option<GatePermit> {
		let mut state = self.state.lock();
		while state.held && !state.closed {
			self.released.wait(&mut state);
		}
		if state.closed {
			return None;
		}
		state.held = true;
		Some(GatePermit {
			gate: self.clone(),
		})
	}

	/// Wakes every waiter; later acquisitions fail.
	pub(crate) fn close(&self) {
		self.state.lock().closed = true;
		self.released.notify_all();
	}

	fn release(&self) {
		self.state.lock().held = false;
		self.released.notify_one();
	}
}

/// Releases the gate when dropped.
pub(crate) struct GatePermit {
	gate: Arc<Gate>,
}

impl Drop for GatePermit {
	fn drop(&mut self) {
		self.gate.release();
	}
}
