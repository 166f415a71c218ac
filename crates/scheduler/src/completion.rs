// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll, Waker},
	time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use switchyard_core::{ScriptError, ScriptId};

type Outcome = Result<(), ScriptError>;

#[derive(Default)]
struct State {
	done: bool,
	outcome: Option<Outcome>,
	waker: Option<Waker>,
}

#[derive(Default)]
struct Slot {
	state: Mutex<State>,
	ready: Condvar,
}

impl Slot {
	fn finish(&self, outcome: Option<Outcome>) {
		let waker = {
			let mut state = self.state.lock();
			state.done = true;
			state.outcome = outcome;
			self.ready.notify_all();
			state.waker.take()
		};
		if let Some(waker) = waker {
			waker.wake();
		}
	}
}

pub(crate) fn channel(script: ScriptId) -> (Completer, Completion) {
	let slot = Arc::new(Slot::default());
	(
		Completer {
			slot: slot.clone(),
			sent: false,
		},
		Completion {
			script,
			slot,
		},
	)
}

/// Worker side of a [`Completion`]. Dropped without completing, the work
/// counts as abandoned.
pub(crate) struct Completer {
	slot: Arc<Slot>,
	sent: bool,
}

impl Completer {
	pub(crate) fn complete(mut self, outcome: Outcome) {
		self.sent = true;
		self.slot.finish(Some(outcome));
	}
}

impl Drop for Completer {
	fn drop(&mut self) {
		if !self.sent {
			self.slot.finish(None);
		}
	}
}

/// Outcome of one scheduled piece of work.
///
/// Resolves after the work has fully run. Await it from async code or call
/// [`Completion::wait`] from a plain thread.
pub struct Completion {
	script: ScriptId,
	slot: Arc<Slot>,
}

impl Completion {
	pub fn script(&self) -> &ScriptId {
		&self.script
	}

	pub fn is_done(&self) -> bool {
		self.slot.state.lock().done
	}

	/// Blocks the current thread until the work is done.
	pub fn wait(self) -> Outcome {
		let mut state = self.slot.state.lock();
		while !state.done {
			self.slot.ready.wait(&mut state);
		}
		self.take(&mut state)
	}

	/// Blocks for at most `timeout`. Hands the completion back while the work
	/// is still running.
	pub fn wait_timeout(self, timeout: Duration) -> Result<Outcome, Completion> {
		let deadline = Instant::now() + timeout;
		let outcome = {
			let mut state = self.slot.state.lock();
			while !state.done {
				if self.slot.ready.wait_until(&mut state, deadline).timed_out() {
					break;
				}
			}
			if state.done {
				Some(self.take(&mut state))
			} else {
				None
			}
		};
		match outcome {
			Some(outcome) => Ok(outcome),
			None => Err(self),
		}
	}

	fn take(&self, state: &mut State) -> Outcome {
		state.outcome.take().unwrap_or_else(|| {
			Err(ScriptError::Abandoned {
				script: self.script.clone(),
			})
		})
	}
}

impl Future for Completion {
	type Output = Outcome;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut state = self.slot.state.lock();
		if state.done {
			return Poll::Ready(self.take(&mut state));
		}
		state.waker = Some(cx.waker().clone());
		Poll::Pending
	}
}

impl std::fmt::Debug for Completion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Completion").field("script", &self.script).field("done", &self.is_done()).finish()
	}
}
