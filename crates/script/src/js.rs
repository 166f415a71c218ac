// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! JavaScript scripts on QuickJS.
//!
//! A script is an ES module. Its default export is called with the raw change
//! record text and may return a promise, which is driven until it settles.
//! An optional `initCDC` export runs once at registration and may return
//! (or resolve to) `{ databases: [...], tables: [...] }`.
//!
//! Every context installs two globals:
//!
//! ```js
//! es.put({ url, username, password, idKey, records })    // Promise<string>
//! es.delete({ url, username, password, idKey, records }) // Promise<string>
//! console.log(...) / console.warn(...) / console.error(...)
//! ```
//!
//! Sink operations start as soon as they are called and return a thenable
//! that blocks on the response only once it is awaited. Operations the
//! script never awaited are still waited for before the invocation returns,
//! and their failures reject the invocation.

use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use parking_lot::Mutex;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Function, Module, Object, Persistent, Runtime, Value};
use serde::Deserialize;
use serde_json::json;
use switchyard_core::{Interest, ScriptError, ScriptId};
use switchyard_sink::{Sink, SinkAction};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::{ScriptDescriptor, calls::SinkCalls};

const PRELUDE: &str = r#"
(() => {
	const submit = globalThis.__switchyard_submit;
	const settle = globalThis.__switchyard_wait;
	const log = globalThis.__switchyard_log;
	delete globalThis.__switchyard_submit;
	delete globalThis.__switchyard_wait;
	delete globalThis.__switchyard_log;

	const call = (action, params) => {
		const started = JSON.parse(submit(action, JSON.stringify(params === undefined ? null : params)));
		if (started.error !== undefined) {
			return Promise.reject(new Error(started.error));
		}
		let done;
		const outcome = () => {
			if (done === undefined) {
				const answer = JSON.parse(settle(started.id));
				done = answer.error !== undefined ? Promise.reject(new Error(answer.error)) : Promise.resolve(answer.body);
			}
			return done;
		};
		return Object.freeze({
			then: (resolve, reject) => outcome().then(resolve, reject),
			catch: (reject) => outcome().catch(reject),
			finally: (always) => outcome().finally(always),
		});
	};
	const format = (args) => args.map((arg) => (typeof arg === "string" ? arg : JSON.stringify(arg))).join(" ");

	globalThis.es = Object.freeze({
		put: (params) => call("put", params),
		delete: (params) => call("delete", params),
	});
	globalThis.console = Object.freeze({
		log: (...args) => log("info", format(args)),
		info: (...args) => log("info", format(args)),
		warn: (...args) => log("warn", format(args)),
		error: (...args) => log("error", format(args)),
	});
})();
"#;

/// State behind the globals of one context.
struct JsHost {
	script: ScriptId,
	calls: SinkCalls,
}

impl JsHost {
	fn submit(&mut self, action: &str, params: &str) -> String {
		let action = match action {
			"put" => SinkAction::Put,
			"delete" => SinkAction::Delete,
			other => return json!({ "error": format!("unknown sink action {}", other) }).to_string(),
		};
		match self.calls.start(action, params.as_bytes()) {
			Ok(id) => json!({ "id": id }).to_string(),
			Err(message) => json!({ "error": message }).to_string(),
		}
	}

	fn wait(&mut self, id: i32) -> String {
		match self.calls.wait(id) {
			Ok(body) => json!({ "body": body }).to_string(),
			Err(message) => json!({ "error": message }).to_string(),
		}
	}

	fn log(&self, level: &str, line: &str) {
		match level {
			"warn" => warn!(script = %self.script, "{}", line),
			"error" => error!(script = %self.script, "{}", line),
			_ => info!(script = %self.script, "{}", line),
		}
	}
}

struct Cached {
	version: u64,
	function: Persistent<Function<'static>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Declared {
	databases: Vec<String>,
	tables: Vec<String>,
}

/// Why evaluating a module or running `initCDC` failed.
enum Failure {
	Load(String),
	MissingDefault,
	Init(String),
}

/// A QuickJS runtime and context plus the default exports evaluated in it.
///
/// Modules cannot be unloaded from a context, so every evaluation of a new
/// version leaves the previous one behind until the context is rebuilt.
pub(crate) struct JsContext {
	// dropped before the runtime they live in
	functions: HashMap<ScriptId, Cached>,
	host: Arc<Mutex<JsHost>>,
	context: Context,
	runtime: Runtime,
	modules: u64,
	stale: usize,
}

// SAFETY: the cached `Persistent` functions only point into `runtime`, which
// is `Send` under rquickjs's `parallel` feature and moves together with them.
unsafe impl Send for JsContext {}

impl JsContext {
	pub(crate) fn new(sink: Arc<dyn Sink>, io: Handle, interrupted: Arc<AtomicBool>) -> Result<Self, ScriptError> {
		let engine = |e: rquickjs::Error| ScriptError::Engine(e.to_string());
		let runtime = Runtime::new().map_err(engine)?;
		runtime.set_interrupt_handler(Some(Box::new(move || interrupted.load(Ordering::SeqCst))));
		let context = Context::full(&runtime).map_err(engine)?;

		let host = Arc::new(Mutex::new(JsHost {
			script: ScriptId::from(""),
			calls: SinkCalls::new(sink, io),
		}));
		context
			.with(|ctx| install(&ctx, &host).catch(&ctx).map_err(describe))
			.map_err(ScriptError::Engine)?;

		Ok(Self {
			functions: HashMap::new(),
			host,
			context,
			runtime,
			modules: 0,
			stale: 0,
		})
	}

	pub(crate) fn stale(&self) -> usize {
		self.stale
	}

	/// Calls the script's default export with `record` and waits for the
	/// promise it returns as well as every sink operation it started.
	pub(crate) fn execute(&mut self, descriptor: &ScriptDescriptor, source: &str, record: &str) -> Result<(), ScriptError> {
		let script = &descriptor.id;
		self.begin(script);
		let function = self.function(descriptor, source)?;

		let outcome = self.context.with(|ctx| -> Result<(), String> {
			let function = function.restore(&ctx).map_err(|e| e.to_string())?;
			let value: Value = function.call((record.to_string(),)).catch(&ctx).map_err(describe)?;
			match value.into_promise() {
				Some(promise) => promise.finish::<Value>().catch(&ctx).map(|_| ()).map_err(describe),
				None => Ok(()),
			}
		});
		let failures = self.host.lock().calls.settle();

		let rejected = |message: String| ScriptError::Rejected {
			script: script.clone(),
			message,
		};
		match outcome {
			Ok(()) if failures.is_empty() => Ok(()),
			Ok(()) => Err(rejected(failures.join("; "))),
			Err(message) => Err(rejected(message)),
		}
	}

	/// Evaluates the module, checks its default export and runs `initCDC`.
	pub(crate) fn initialize(&mut self, script: &ScriptId, source: &str) -> Result<Interest, ScriptError> {
		self.begin(script);
		let name = self.module_name(script);

		let declared = self.context.with(|ctx| -> Result<Option<String>, Failure> {
			let exports = evaluate(&ctx, name, source).catch(&ctx).map_err(|e| Failure::Load(describe(e)))?;
			let default: Value = exports.get("default").map_err(|e| Failure::Load(e.to_string()))?;
			if !default.is_function() {
				return Err(Failure::MissingDefault);
			}

			let init: Value = exports.get("initCDC").map_err(|e| Failure::Load(e.to_string()))?;
			if init.is_undefined() {
				return Ok(None);
			}
			let init = init.into_function().ok_or_else(|| Failure::Init("initCDC is not a function".to_string()))?;
			let value: Value = init.call(()).catch(&ctx).map_err(|e| Failure::Init(describe(e)))?;
			let value = match value.clone().into_promise() {
				Some(promise) => promise.finish::<Value>().catch(&ctx).map_err(|e| Failure::Init(describe(e)))?,
				None => value,
			};
			match ctx.json_stringify(value).catch(&ctx).map_err(|e| Failure::Init(describe(e)))? {
				Some(text) => text.to_string().map(Some).map_err(|e| Failure::Init(e.to_string())),
				None => Ok(None),
			}
		});
		let failures = self.host.lock().calls.settle();

		let init_failed = |message: String| ScriptError::Init {
			script: script.clone(),
			message,
		};
		let declared = match declared {
			Ok(declared) => declared,
			Err(Failure::Load(message)) => {
				return Err(ScriptError::Load {
					script: script.clone(),
					message,
				});
			}
			Err(Failure::MissingDefault) => {
				return Err(ScriptError::MissingExport {
					script: script.clone(),
					export: "default",
				});
			}
			Err(Failure::Init(message)) => return Err(init_failed(message)),
		};
		if !failures.is_empty() {
			return Err(init_failed(failures.join("; ")));
		}

		let declared = match declared.as_deref() {
			None | Some("null") => Declared::default(),
			Some(text) => serde_json::from_str::<Declared>(text)
				.map_err(|e| init_failed(format!("initCDC must return {{ databases, tables }}: {}", e)))?,
		};
		Ok(Interest {
			databases: declared.databases.into_iter().collect(),
			tables: declared.tables.into_iter().collect(),
		})
	}

	fn begin(&self, script: &ScriptId) {
		let mut host = self.host.lock();
		host.script = script.clone();
		host.calls.clear();
	}

	fn module_name(&mut self, script: &ScriptId) -> String {
		self.modules += 1;
		format!("{}#{}", script, self.modules)
	}

	fn function(&mut self, descriptor: &ScriptDescriptor, source: &str) -> Result<Persistent<Function<'static>>, ScriptError> {
		if let Some(cached) = self.functions.get(&descriptor.id) {
			if cached.version == descriptor.version {
				return Ok(cached.function.clone());
			}
		}
		if self.functions.remove(&descriptor.id).is_some() {
			self.stale += 1;
			self.runtime.run_gc();
		}

		let name = self.module_name(&descriptor.id);
		let function = self
			.context
			.with(|ctx| -> Result<Persistent<Function<'static>>, String> {
				let exports = evaluate(&ctx, name, source).catch(&ctx).map_err(describe)?;
				let function: Function = exports.get("default").map_err(|_| "default export is not a function".to_string())?;
				Ok(Persistent::save(&ctx, function))
			})
			.map_err(|message| ScriptError::Load {
				script: descriptor.id.clone(),
				message,
			})?;

		self.functions.insert(
			descriptor.id.clone(),
			Cached {
				version: descriptor.version,
				function: function.clone(),
			},
		);
		Ok(function)
	}
}

fn install<'js>(ctx: &Ctx<'js>, host: &Arc<Mutex<JsHost>>) -> rquickjs::Result<()> {
	let globals = ctx.globals();

	let submit = host.clone();
	globals.set(
		"__switchyard_submit",
		Function::new(ctx.clone(), move |action: String, params: String| -> String { submit.lock().submit(&action, &params) })?,
	)?;

	let wait = host.clone();
	globals.set("__switchyard_wait", Function::new(ctx.clone(), move |id: i32| -> String { wait.lock().wait(id) })?)?;

	let log = host.clone();
	globals.set(
		"__switchyard_log",
		Function::new(ctx.clone(), move |level: String, line: String| log.lock().log(&level, &line))?,
	)?;

	ctx.eval::<(), _>(PRELUDE)
}

/// The thrown message for errors, the full report for anything else thrown.
fn describe(error: CaughtError<'_>) -> String {
	match error {
		CaughtError::Exception(exception) => exception.message().unwrap_or_else(|| exception.to_string()),
		CaughtError::Value(value) => match value.as_string().and_then(|s| s.to_string().ok()) {
			Some(text) => text,
			None => format!("{:?}", value),
		},
		CaughtError::Error(error) => error.to_string(),
	}
}

/// Declares and evaluates an ES module, running its top-level code to completion.
fn evaluate<'js>(ctx: &Ctx<'js>, name: String, source: &str) -> rquickjs::Result<Object<'js>> {
	let (module, promise) = Module::declare(ctx.clone(), name, source)?.eval()?;
	promise.finish::<()>()?;
	module.namespace()
}
