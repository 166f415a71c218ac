// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Dedicated thread running `initCDC` and `init_cdc`.
//!
//! Initialisation never runs on a pool worker. Registrars hand the loaded
//! code over and block until the thread answers with the declared interest.
//! Every JavaScript initialisation gets a fresh context.

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use switchyard_core::{Interest, ScriptError, ScriptId};
use tracing::{debug, info};
use wasmtime::Module;

use crate::{
	ScriptCode,
	context::{Environment, instantiate},
};

struct InitJob {
	script: ScriptId,
	code: ScriptCode,
	reply: Sender<Result<Interest, ScriptError>>,
}

pub(crate) struct Initializer {
	jobs: Mutex<Option<Sender<InitJob>>>,
	thread: Mutex<Option<JoinHandle<()>>>,
}

impl Initializer {
	pub(crate) fn spawn(env: Arc<Environment>) -> Result<Self, ScriptError> {
		let (jobs, rx) = unbounded();
		let thread = thread::Builder::new()
			.name("script-init".to_string())
			.spawn(move || {
				debug!("script initializer started");
				run(&env, rx);
				debug!("script initializer stopped");
			})
			.map_err(|e| ScriptError::Engine(format!("failed to spawn script initializer: {}", e)))?;

		Ok(Self {
			jobs: Mutex::new(Some(jobs)),
			thread: Mutex::new(Some(thread)),
		})
	}

	/// Runs the script's initialisation and returns the interest it declared.
	pub(crate) fn initialize(&self, script: &ScriptId, code: &ScriptCode) -> Result<Interest, ScriptError> {
		let sender = self.jobs.lock().clone().ok_or(ScriptError::Shutdown)?;
		let (reply, answer) = bounded(1);
		sender.send(InitJob {
			script: script.clone(),
			code: code.clone(),
			reply,
		})
		.map_err(|_| ScriptError::Shutdown)?;
		answer.recv().map_err(|_| ScriptError::Shutdown)?
	}

	pub(crate) fn shutdown(&self) {
		self.jobs.lock().take();
		if let Some(thread) = self.thread.lock().take() {
			let _ = thread.join();
		}
	}
}

fn run(env: &Environment, jobs: Receiver<InitJob>) {
	for job in jobs.iter() {
		let result = match &job.code {
			ScriptCode::JavaScript(source) => env.new_js().and_then(|mut js| js.initialize(&job.script, source)),
			ScriptCode::WebAssembly(module) => initialize(env, &job.script, module),
		};
		if let Ok(interest) = &result {
			info!(script = %job.script, databases = ?interest.databases, tables = ?interest.tables, "script initialised");
		}
		let _ = job.reply.send(result);
	}
}

fn initialize(env: &Environment, script: &ScriptId, module: &Module) -> Result<Interest, ScriptError> {
	let failed = |message: String| ScriptError::Init {
		script: script.clone(),
		message,
	};

	let mut store = env.new_store();
	store.data_mut().begin(script);
	let bindings = instantiate(env, &mut store, module).map_err(failed)?;
	let Some(init) = bindings.init else {
		return Ok(Interest::everything());
	};

	store.set_epoch_deadline(1);
	let outcome = init.call(&mut store, ()).map_err(|e| format!("{:#}", e));
	let failures = store.data_mut().settle();
	let error = store.data_mut().take_error();

	match outcome {
		Ok(()) if failures.is_empty() => Ok(store.data_mut().take_interest()),
		Ok(()) => Err(failed(failures.join("; "))),
		Err(trap) => Err(failed(error.unwrap_or(trap))),
	}
}
