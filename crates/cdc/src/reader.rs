// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use switchyard_core::{ChangeRecord, Interest, ScriptError, ScriptId, SourceIdentity};
use switchyard_log::{Cursor, EventLog, LogEntry, LogError};
use switchyard_runtime::{Backoff, CancellationToken};
use switchyard_scheduler::{Completion, SchedulerError, ScriptScheduler};
use switchyard_script::ScriptRuntime;
use tracing::{debug, error, trace, warn};

use crate::{CdcError, Result};

/// How a reader schedules its script and parks when the log is drained.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
	/// Execute one record at a time, in log order.
	pub serial: bool,
	pub initial_backoff: Duration,
	pub max_backoff: Duration,
	/// How often a reader waiting on a running script checks for cancellation.
	pub cancel_poll: Duration,
}

impl Default for ReaderConfig {
	fn default() -> Self {
		Self {
			serial: true,
			initial_backoff: Duration::from_millis(1),
			max_backoff: Duration::from_millis(100),
			cancel_poll: Duration::from_millis(50),
		}
	}
}

enum Step {
	Continue,
	Stop,
}

struct Context {
	script: ScriptId,
	source: SourceIdentity,
	interest: Interest,
	log: Arc<EventLog>,
	runtime: ScriptRuntime,
	scheduler: ScriptScheduler,
	config: ReaderConfig,
	cancel: CancellationToken,
}

/// Tails one source's event log on behalf of one script.
///
/// Each record passing the script's interest is scheduled and awaited; the
/// cursor is committed afterwards whether the script succeeded or not.
pub struct ScriptReader {
	script: ScriptId,
	source: SourceIdentity,
	cancel: CancellationToken,
	thread: Option<JoinHandle<()>>,
}

impl ScriptReader {
	#[allow(clippy::too_many_arguments)]
	pub fn spawn(
		script: ScriptId,
		source: SourceIdentity,
		interest: Interest,
		log: Arc<EventLog>,
		runtime: ScriptRuntime,
		scheduler: ScriptScheduler,
		config: ReaderConfig,
	) -> Result<Self> {
		let cursor = log.open_cursor(&script)?;
		let cancel = CancellationToken::new();
		let context = Context {
			script: script.clone(),
			source: source.clone(),
			interest,
			log,
			runtime,
			scheduler,
			config,
			cancel: cancel.clone(),
		};

		let name = format!("reader-{}", script);
		let thread = thread::Builder::new()
			.name(name.clone())
			.spawn(move || {
				debug!(script = %context.script, source = %context.source, "reader started");
				run(&context, &cursor);
				context.log.close_cursor(&context.script);
				debug!(script = %context.script, source = %context.source, "reader stopped");
			})
			.map_err(|source| CdcError::Spawn {
				name,
				source,
			})?;

		Ok(Self {
			script,
			source,
			cancel,
			thread: Some(thread),
		})
	}

	pub fn script(&self) -> &ScriptId {
		&self.script
	}

	pub fn source(&self) -> &SourceIdentity {
		&self.source
	}

	pub fn is_running(&self) -> bool {
		self.thread.as_ref().is_some_and(|t| !t.is_finished())
	}

	/// Signals the reader to stop without waiting for it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Cancels the reader and waits for its thread to exit.
	///
	/// A reader waiting on a script that is still running leaves without
	/// committing, so the record is delivered again.
	pub fn stop(&mut self) {
		self.cancel.cancel();
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				error!(script = %self.script, source = %self.source, "reader thread panicked");
			}
		}
	}
}

impl Drop for ScriptReader {
	fn drop(&mut self) {
		self.stop();
	}
}

fn run(context: &Context, cursor: &Cursor) {
	let mut backoff = Backoff::new(context.config.initial_backoff, context.config.max_backoff);

	while !context.cancel.is_cancelled() {
		let seen = context.log.append_generation();
		match cursor.read_next() {
			Ok(Some(entry)) => {
				backoff.reset();
				match process(context, entry) {
					Step::Continue => {
						if let Err(e) = cursor.commit() {
							warn!(script = %context.script, source = %context.source, error = %e, "cursor commit failed");
						}
					}
					Step::Stop => break,
				}
			}
			Ok(None) => {
				context.log.wait_for_append(seen, backoff.next_delay());
			}
			Err(e @ LogError::Corrupt {
				..
			}) => {
				error!(script = %context.script, source = %context.source, error = %e, "skipping corrupt record");
			}
			Err(e) => {
				error!(script = %context.script, source = %context.source, error = %e, "event log read failed");
				context.cancel.wait_timeout(backoff.next_delay());
			}
		}
	}
}

fn process(context: &Context, entry: LogEntry) -> Step {
	let position = entry.position;
	let record = match entry.into_text().map(ChangeRecord::parse) {
		Ok(Ok(record)) => record,
		Ok(Err(reason)) => {
			warn!(script = %context.script, segment = position.segment, offset = position.offset, reason = %reason, "stored record skipped");
			return Step::Continue;
		}
		Err(e) => {
			warn!(script = %context.script, error = %e, "stored record skipped");
			return Step::Continue;
		}
	};

	if !context.interest.matches(record.db(), record.table()) {
		trace!(script = %context.script, db = record.db().unwrap_or_default(), table = record.table().unwrap_or_default(), "record outside interest");
		return Step::Continue;
	}

	let runtime = context.runtime.clone();
	let script = context.script.clone();
	let text = record.shared_text();
	let scheduled = context.scheduler.schedule(&context.script, context.config.serial, move || {
		runtime.execute(&script, &text)
	});

	let result = match scheduled {
		Ok(completion) => match wait(context, completion) {
			Some(result) => result,
			None => {
				debug!(script = %context.script, "reader cancelled while the script is running");
				return Step::Stop;
			}
		},
		Err(SchedulerError::Closed) => {
			debug!(script = %context.script, "scheduler closed, reader stopping");
			return Step::Stop;
		}
		Err(e) => {
			error!(script = %context.script, error = %e, "failed to schedule script");
			return Step::Stop;
		}
	};

	match result {
		Ok(()) => {
			trace!(script = %context.script, segment = position.segment, offset = position.offset, "record processed");
			Step::Continue
		}
		// not executed, keep the record for the next run
		Err(ScriptError::Shutdown | ScriptError::Abandoned { .. }) => Step::Stop,
		Err(e) => {
			error!(
				script = %context.script,
				source = %context.source,
				db = record.db().unwrap_or_default(),
				table = record.table().unwrap_or_default(),
				op = record.op().code(),
				error = %e,
				"script failed to process record"
			);
			Step::Continue
		}
	}
}

/// Waits for the script to finish. `None` when the reader is cancelled first.
fn wait(context: &Context, mut completion: Completion) -> Option<std::result::Result<(), ScriptError>> {
	loop {
		match completion.wait_timeout(context.config.cancel_poll) {
			Ok(result) => return Some(result),
			Err(_) if context.cancel.is_cancelled() => return None,
			Err(running) => completion = running,
		}
	}
}

impl std::fmt::Debug for ScriptReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScriptReader").field("script", &self.script).field("source", &self.source).finish()
	}
}

