// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread::{self, ThreadId},
	time::Duration,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use switchyard_core::{ScriptError, ScriptId};
use switchyard_sink::Sink;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use wasmtime::{Engine, Linker, Memory, Module, Store, TypedFunc};

use crate::{ScriptCode, ScriptDescriptor, host::HostState, js::JsContext};

/// What every store is created from.
pub(crate) struct Environment {
	pub(crate) engine: Engine,
	pub(crate) linker: Linker<HostState>,
	pub(crate) sink: Arc<dyn Sink>,
	pub(crate) io: Handle,
	/// Set once at shutdown; stops running JavaScript.
	pub(crate) interrupted: Arc<AtomicBool>,
}

impl Environment {
	pub(crate) fn new_js(&self) -> Result<JsContext, ScriptError> {
		JsContext::new(self.sink.clone(), self.io.clone(), self.interrupted.clone())
	}

	pub(crate) fn is_interrupted(&self) -> bool {
		self.interrupted.load(Ordering::SeqCst)
	}

	pub(crate) fn new_store(&self) -> Store<HostState> {
		let mut store = Store::new(&self.engine, HostState::new(self.sink.clone(), self.io.clone()));
		store.set_epoch_deadline(1);
		store
	}
}

#[derive(Clone)]
pub(crate) struct Bindings {
	pub(crate) memory: Memory,
	pub(crate) alloc: TypedFunc<i32, i32>,
	pub(crate) handle: TypedFunc<(i32, i32), i32>,
	pub(crate) init: Option<TypedFunc<(), ()>>,
}

pub(crate) fn instantiate(
	env: &Environment,
	store: &mut Store<HostState>,
	module: &Module,
) -> Result<Bindings, String> {
	store.set_epoch_deadline(1);
	let instance = env.linker.instantiate(&mut *store, module).map_err(|e| format!("{:#}", e))?;
	let memory = instance.get_memory(&mut *store, "memory").ok_or_else(|| "missing memory export".to_string())?;
	let alloc = instance.get_typed_func::<i32, i32>(&mut *store, "alloc").map_err(|e| format!("alloc: {:#}", e))?;
	let handle = instance
		.get_typed_func::<(i32, i32), i32>(&mut *store, "handle")
		.map_err(|e| format!("handle: {:#}", e))?;
	let init = match instance.get_func(&mut *store, "init_cdc") {
		Some(func) => Some(func.typed::<(), ()>(&*store).map_err(|e| format!("init_cdc: {:#}", e))?),
		None => None,
	};
	Ok(Bindings {
		memory,
		alloc,
		handle,
		init,
	})
}

struct Cached {
	version: u64,
	bindings: Bindings,
}

/// A store plus the instances created in it, and a JavaScript context,
/// owned by one worker thread.
pub(crate) struct ExecutionContext {
	thread: ThreadId,
	store: Store<HostState>,
	instances: HashMap<ScriptId, Cached>,
	js: Option<JsContext>,
	stale: usize,
	stale_limit: usize,
}

impl ExecutionContext {
	fn new(env: &Environment, stale_limit: usize) -> Self {
		Self {
			thread: thread::current().id(),
			store: env.new_store(),
			instances: HashMap::new(),
			js: None,
			stale: 0,
			stale_limit,
		}
	}

	/// Instances are never freed individually, only together with their store.
	fn discard(&mut self, script: &ScriptId) {
		if self.instances.remove(script).is_some() {
			self.stale += 1;
		}
	}

	fn bindings(&mut self, env: &Environment, descriptor: &ScriptDescriptor) -> Result<Bindings, ScriptError> {
		if let Some(cached) = self.instances.get(&descriptor.id) {
			if cached.version == descriptor.version {
				return Ok(cached.bindings.clone());
			}
		}
		self.discard(&descriptor.id);

		if self.stale > self.stale_limit {
			debug!(thread = ?self.thread, stale = self.stale, "rebuilding execution context");
			self.store = env.new_store();
			self.instances.clear();
			self.stale = 0;
		}

		let ScriptCode::WebAssembly(module) = &descriptor.code else {
			return Err(ScriptError::Engine(format!("{} is not a WebAssembly script", descriptor.id)));
		};
		let bindings = instantiate(env, &mut self.store, module).map_err(|message| {
			ScriptError::Load {
				script: descriptor.id.clone(),
				message,
			}
		})?;
		self.instances.insert(
			descriptor.id.clone(),
			Cached {
				version: descriptor.version,
				bindings: bindings.clone(),
			},
		);
		Ok(bindings)
	}

	/// Runs the script with `record` and waits for every sink operation it started.
	pub(crate) fn execute(
		&mut self,
		env: &Environment,
		descriptor: &ScriptDescriptor,
		record: &str,
	) -> Result<(), ScriptError> {
		if env.is_interrupted() {
			return Err(ScriptError::Shutdown);
		}
		match &descriptor.code {
			ScriptCode::JavaScript(source) => self.javascript(env)?.execute(descriptor, source, record),
			ScriptCode::WebAssembly(_) => self.execute_wasm(env, descriptor, record.as_bytes()),
		}
	}

	fn javascript(&mut self, env: &Environment) -> Result<&mut JsContext, ScriptError> {
		let js = match self.js.take() {
			Some(js) if js.stale() <= self.stale_limit => js,
			Some(js) => {
				debug!(thread = ?self.thread, stale = js.stale(), "rebuilding javascript context");
				drop(js);
				env.new_js()?
			}
			None => env.new_js()?,
		};
		Ok(self.js.insert(js))
	}

	fn execute_wasm(&mut self, env: &Environment, descriptor: &ScriptDescriptor, input: &[u8]) -> Result<(), ScriptError> {
		let bindings = self.bindings(env, descriptor)?;
		let script = &descriptor.id;

		self.store.data_mut().begin(script);
		self.store.set_epoch_deadline(1);
		// an epoch bump between the check above and the deadline would be missed
		if env.is_interrupted() {
			return Err(ScriptError::Shutdown);
		}
		let outcome = call(&mut self.store, &bindings, input);
		let failures = self.store.data_mut().settle();
		let error = self.store.data_mut().take_error();

		let rejected = |message: String| ScriptError::Rejected {
			script: script.clone(),
			message,
		};

		match outcome {
			Ok(0) if failures.is_empty() => Ok(()),
			Ok(0) => Err(rejected(failures.join("; "))),
			Ok(code) => Err(rejected(error.unwrap_or_else(|| format!("handle returned {}", code)))),
			Err(trap) => {
				// guest state after a trap is unknown
				self.discard(script);
				Err(rejected(error.unwrap_or(trap)))
			}
		}
	}

	pub(crate) fn close(&mut self) {
		self.stale += self.instances.len();
		self.instances.clear();
		self.js = None;
	}

	#[cfg(test)]
	pub(crate) fn stale(&self) -> usize {
		self.stale
	}

	#[cfg(test)]
	pub(crate) fn js_stale(&self) -> Option<usize> {
		self.js.as_ref().map(JsContext::stale)
	}
}

fn call(store: &mut Store<HostState>, bindings: &Bindings, input: &[u8]) -> Result<i32, String> {
	let len = i32::try_from(input.len()).map_err(|_| "record too large for guest memory".to_string())?;
	let ptr = bindings.alloc.call(&mut *store, len).map_err(|e| format!("{:#}", e))?;
	if ptr < 0 {
		return Err(format!("alloc returned {}", ptr));
	}
	bindings.memory.write(&mut *store, ptr as usize, input).map_err(|e| e.to_string())?;
	bindings.handle.call(&mut *store, (ptr, len)).map_err(|e| format!("{:#}", e))
}

/// Execution contexts keyed by the worker thread that owns them.
#[derive(Default)]
pub(crate) struct ContextPool {
	contexts: DashMap<ThreadId, Arc<Mutex<ExecutionContext>>>,
}

impl ContextPool {
	/// The calling thread's context, created on first use.
	pub(crate) fn current(&self, env: &Environment, stale_limit: usize) -> Arc<Mutex<ExecutionContext>> {
		let id = thread::current().id();
		if let Some(context) = self.contexts.get(&id) {
			return context.value().clone();
		}
		let context = Arc::new(Mutex::new(ExecutionContext::new(env, stale_limit)));
		self.contexts.insert(id, context.clone());
		debug!(thread = ?id, "execution context created");
		context
	}

	pub(crate) fn len(&self) -> usize {
		self.contexts.len()
	}

	/// Closes every context that can be locked within `timeout` and forgets all of them.
	pub(crate) fn close_all(&self, timeout: Duration) {
		let contexts: Vec<_> = self.contexts.iter().map(|e| (*e.key(), e.value().clone())).collect();
		for (thread, context) in contexts {
			match context.try_lock_for(timeout) {
				Some(mut context) => context.close(),
				None => warn!(thread = ?thread, "execution context busy, leaving it to its thread"),
			}
		}
		self.contexts.clear();
	}
}
