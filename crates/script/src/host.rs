// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Host functions imported by WebAssembly scripts.
//!
//! | module | function               | result                                   |
//! |--------|------------------------|------------------------------------------|
//! | host   | log(ptr, len)          |                                          |
//! | host   | error(ptr, len)        | sets the rejection message               |
//! | cdc    | database(ptr, len)     | declares interest, during `init_cdc`     |
//! | cdc    | table(ptr, len)        | declares interest, during `init_cdc`     |
//! | sink   | put(ptr, len)          | pending handle > 0, or -1                |
//! | sink   | delete(ptr, len)       | pending handle > 0, or -1                |
//! | sink   | await(handle)          | 0 on success, -1 on failure              |
//! | sink   | response(ptr, cap)     | full length of the last response body    |

use std::sync::Arc;

use switchyard_core::{Interest, ScriptId};
use switchyard_sink::{Sink, SinkAction};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use wasmtime::{Caller, Engine, Linker};

use crate::{ScriptError, calls::SinkCalls};

/// Per-store state visible to host functions.
pub(crate) struct HostState {
	script: ScriptId,
	calls: SinkCalls,
	error: Option<String>,
	response: Option<String>,
	interest: Interest,
}

impl HostState {
	pub(crate) fn new(sink: Arc<dyn Sink>, io: Handle) -> Self {
		Self {
			script: ScriptId::from(""),
			calls: SinkCalls::new(sink, io),
			error: None,
			response: None,
			interest: Interest::everything(),
		}
	}

	/// Resets per-invocation state.
	pub(crate) fn begin(&mut self, script: &ScriptId) {
		self.script = script.clone();
		self.error = None;
		self.response = None;
		self.calls.clear();
		self.interest = Interest::everything();
	}

	/// Blocks until every operation the invocation started and did not
	/// await has finished. Returns the failure messages.
	pub(crate) fn settle(&mut self) -> Vec<String> {
		self.calls.settle()
	}

	pub(crate) fn take_error(&mut self) -> Option<String> {
		self.error.take()
	}

	pub(crate) fn take_interest(&mut self) -> Interest {
		std::mem::take(&mut self.interest)
	}

	fn start(&mut self, action: SinkAction, params: &[u8]) -> i32 {
		match self.calls.start(action, params) {
			Ok(id) => id,
			Err(message) => {
				debug!(script = %self.script, error = %message, "sink request rejected");
				self.error = Some(message);
				-1
			}
		}
	}

	fn wait(&mut self, id: i32) -> i32 {
		match self.calls.wait(id) {
			Ok(body) => {
				self.response = Some(body);
				0
			}
			Err(message) => {
				self.error = Some(message);
				-1
			}
		}
	}
}

/// Copies `len` bytes at `ptr` out of guest memory. `None` unless the whole
/// range lies inside the memory.
fn read_guest(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Option<Vec<u8>> {
	let start = usize::try_from(ptr).ok()?;
	let len = usize::try_from(len).ok()?;
	let end = start.checked_add(len)?;
	let memory = caller.get_export("memory")?.into_memory()?;
	memory.data(&*caller).get(start..end).map(<[u8]>::to_vec)
}

fn read_text(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Option<String> {
	read_guest(caller, ptr, len).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Builds the linker every store instantiates scripts through.
pub(crate) fn linker(engine: &Engine) -> Result<Linker<HostState>, ScriptError> {
	let mut linker = Linker::new(engine);
	register(&mut linker).map_err(|e| ScriptError::Engine(format!("{:#}", e)))?;
	Ok(linker)
}

fn register(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
	linker.func_wrap("host", "log", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
		if let Some(line) = read_text(&mut caller, ptr, len) {
			info!(script = %caller.data().script, "{}", line);
		}
	})?;

	linker.func_wrap("host", "error", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
		let message = read_text(&mut caller, ptr, len).unwrap_or_else(|| "invalid error message".to_string());
		caller.data_mut().error = Some(message);
	})?;

	linker.func_wrap("cdc", "database", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
		if let Some(name) = read_text(&mut caller, ptr, len) {
			caller.data_mut().interest.databases.insert(name);
		}
	})?;

	linker.func_wrap("cdc", "table", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| {
		if let Some(name) = read_text(&mut caller, ptr, len) {
			caller.data_mut().interest.tables.insert(name);
		}
	})?;

	linker.func_wrap("sink", "put", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> i32 {
		match read_guest(&mut caller, ptr, len) {
			Some(params) => caller.data_mut().start(SinkAction::Put, &params),
			None => {
				caller.data_mut().error = Some("sink parameters out of bounds".to_string());
				-1
			}
		}
	})?;

	linker.func_wrap("sink", "delete", |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> i32 {
		match read_guest(&mut caller, ptr, len) {
			Some(params) => caller.data_mut().start(SinkAction::Delete, &params),
			None => {
				caller.data_mut().error = Some("sink parameters out of bounds".to_string());
				-1
			}
		}
	})?;

	linker.func_wrap("sink", "await", |mut caller: Caller<'_, HostState>, id: i32| -> i32 {
		caller.data_mut().wait(id)
	})?;

	linker.func_wrap("sink", "response", |mut caller: Caller<'_, HostState>, ptr: i32, cap: i32| -> i32 {
		let body = caller.data().response.clone().unwrap_or_default();
		let Some(memory) = caller.get_export("memory").and_then(|e| e.into_memory()) else {
			return -1;
		};
		let n = body.len().min(cap.max(0) as usize);
		if ptr < 0 || memory.write(&mut caller, ptr as usize, &body.as_bytes()[..n]).is_err() {
			warn!(script = %caller.data().script, "sink response buffer out of bounds");
			return -1;
		}
		body.len() as i32
	})?;

	Ok(())
}
