// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use switchyard_core::{Interest, ScriptError, ScriptId};
use switchyard_sink::Sink;
use tracing::{debug, info, instrument, warn};
use wasmtime::{Config, Engine, ExternType, Module};

use crate::{
	RuntimeConfig, ScriptCode, ScriptDescriptor, ScriptKind, ScriptRegistry,
	context::{ContextPool, Environment},
	host,
	init::Initializer,
};

const REQUIRED_EXPORTS: [&str; 3] = ["memory", "alloc", "handle"];

struct Inner {
	config: RuntimeConfig,
	env: Arc<Environment>,
	// keeps the sink I/O threads alive
	_io: tokio::runtime::Runtime,
	registry: ScriptRegistry,
	contexts: ContextPool,
	initializer: Initializer,
	shutdown: AtomicBool,
}

/// Executes registered scripts on the calling thread.
///
/// Loaded code is shared; every thread that executes gets its own execution
/// context with its own JavaScript context and WebAssembly instances.
/// Reloading bumps the script's version so every context re-evaluates lazily.
#[derive(Clone)]
pub struct ScriptRuntime {
	inner: Arc<Inner>,
}

impl ScriptRuntime {
	pub fn new(config: RuntimeConfig, sink: Arc<dyn Sink>) -> Result<Self, ScriptError> {
		let mut wasm = Config::new();
		wasm.epoch_interruption(true);
		let engine = Engine::new(&wasm).map_err(|e| ScriptError::Engine(format!("{:#}", e)))?;
		let linker = host::linker(&engine)?;

		let io = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(config.io_threads.max(1))
			.thread_name("script-io")
			.enable_all()
			.build()
			.map_err(|e| ScriptError::Engine(e.to_string()))?;

		let env = Arc::new(Environment {
			engine,
			linker,
			sink,
			io: io.handle().clone(),
			interrupted: Arc::new(AtomicBool::new(false)),
		});
		let initializer = Initializer::spawn(env.clone())?;

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				env,
				_io: io,
				registry: ScriptRegistry::default(),
				contexts: ContextPool::default(),
				initializer,
				shutdown: AtomicBool::new(false),
			}),
		})
	}

	/// Loads the script at `path`, runs its initialisation and makes it executable.
	///
	/// The file extension picks the language: `.js` and `.mjs` are ES modules,
	/// `.wasm` and `.wat` WebAssembly modules. Registering an id that already
	/// exists replaces it with a new version.
	#[instrument(name = "script::register", level = "debug", skip(self, path), fields(path = %path.as_ref().display()))]
	pub fn register(&self, script: &ScriptId, path: impl AsRef<Path>) -> Result<Interest, ScriptError> {
		self.ensure_running()?;
		let path = path.as_ref().to_path_buf();

		let code = self.load(script, &path)?;
		let interest = self.inner.initializer.initialize(script, &code)?;
		let version = self.inner.registry.next_version();
		self.inner.registry.insert(ScriptDescriptor {
			id: script.clone(),
			path,
			code,
			version,
			interest: interest.clone(),
		});
		info!(script = %script, version = version, "script registered");
		Ok(interest)
	}

	/// Recompiles the script from its registered path under a new version.
	///
	/// Executions already running finish on the instance they started with.
	pub fn reload(&self, script: &ScriptId) -> Result<Interest, ScriptError> {
		let descriptor = self.descriptor(script)?;
		let interest = self.register(script, &descriptor.path)?;
		debug!(script = %script, previous = descriptor.version, "script reloaded");
		Ok(interest)
	}

	pub fn unregister(&self, script: &ScriptId) -> bool {
		let removed = self.inner.registry.remove(script).is_some();
		if removed {
			info!(script = %script, "script unregistered");
		}
		removed
	}

	/// Runs the script with `record` and blocks until every sink
	/// operation it started has settled.
	pub fn execute(&self, script: &ScriptId, record: &str) -> Result<(), ScriptError> {
		self.ensure_running()?;
		let descriptor = self.descriptor(script)?;

		let context = self.inner.contexts.current(&self.inner.env, self.inner.config.stale_instance_limit);
		let mut context = context.lock();
		let result = context.execute(&self.inner.env, &descriptor, record);

		match result {
			Err(_) if self.is_shut_down() => Err(ScriptError::Shutdown),
			result => result,
		}
	}

	pub fn descriptor(&self, script: &ScriptId) -> Result<Arc<ScriptDescriptor>, ScriptError> {
		self.inner.registry.get(script).ok_or_else(|| ScriptError::NotRegistered {
			script: script.clone(),
		})
	}

	pub fn interest(&self, script: &ScriptId) -> Option<Interest> {
		self.inner.registry.get(script).map(|d| d.interest.clone())
	}

	pub fn path(&self, script: &ScriptId) -> Option<PathBuf> {
		self.inner.registry.get(script).map(|d| d.path.clone())
	}

	pub fn scripts(&self) -> Vec<ScriptId> {
		self.inner.registry.ids()
	}

	pub fn context_count(&self) -> usize {
		self.inner.contexts.len()
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shutdown.load(Ordering::SeqCst)
	}

	/// Interrupts running guest code, closes contexts and forgets every script.
	pub fn shutdown(&self) {
		if self.inner.shutdown.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.env.interrupted.store(true, Ordering::SeqCst);
		self.inner.env.engine.increment_epoch();
		self.inner.initializer.shutdown();
		self.inner.contexts.close_all(self.inner.config.close_timeout);
		self.inner.registry.clear();
		info!("script runtime shut down");
	}

	fn load(&self, script: &ScriptId, path: &Path) -> Result<ScriptCode, ScriptError> {
		let failed = |message: String| ScriptError::Load {
			script: script.clone(),
			message,
		};
		match ScriptKind::from_path(path) {
			Some(ScriptKind::JavaScript) => {
				let source = fs::read_to_string(path).map_err(|e| failed(format!("{}: {}", path.display(), e)))?;
				Ok(ScriptCode::JavaScript(Arc::from(source)))
			}
			Some(ScriptKind::WebAssembly) => {
				let module = Module::from_file(&self.inner.env.engine, path).map_err(|e| failed(format!("{:#}", e)))?;
				check_exports(script, &module)?;
				Ok(ScriptCode::WebAssembly(module))
			}
			None => Err(failed(format!("{} is not a .js, .mjs, .wasm or .wat file", path.display()))),
		}
	}

	fn ensure_running(&self) -> Result<(), ScriptError> {
		if self.is_shut_down() {
			return Err(ScriptError::Shutdown);
		}
		Ok(())
	}
}

fn check_exports(script: &ScriptId, module: &Module) -> Result<(), ScriptError> {
	for export in REQUIRED_EXPORTS {
		let present = match module.get_export(export) {
			Some(ExternType::Memory(_)) => export == "memory",
			Some(ExternType::Func(_)) => export != "memory",
			_ => false,
		};
		if !present {
			warn!(script = %script, export = export, "script is missing a required export");
			return Err(ScriptError::MissingExport {
				script: script.clone(),
				export,
			});
		}
	}
	Ok(())
}
