// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{path::Path, sync::Arc};

use wasmtime::Module;

/// The languages a script file can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
	JavaScript,
	WebAssembly,
}

impl ScriptKind {
	/// Recognised file extensions, in order of preference.
	pub const EXTENSIONS: [&'static str; 4] = ["js", "mjs", "wasm", "wat"];

	pub fn from_extension(extension: &str) -> Option<Self> {
		match extension {
			"js" | "mjs" => Some(ScriptKind::JavaScript),
			"wasm" | "wat" => Some(ScriptKind::WebAssembly),
			_ => None,
		}
	}

	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
	}
}

impl std::fmt::Display for ScriptKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ScriptKind::JavaScript => f.write_str("javascript"),
			ScriptKind::WebAssembly => f.write_str("webassembly"),
		}
	}
}

/// Loaded script code, shared by every execution context.
#[derive(Clone)]
pub enum ScriptCode {
	/// ES module source. Each context evaluates it on first use.
	JavaScript(Arc<str>),
	/// Compiled module. Each context instantiates it on first use.
	WebAssembly(Module),
}

impl ScriptCode {
	pub fn kind(&self) -> ScriptKind {
		match self {
			ScriptCode::JavaScript(_) => ScriptKind::JavaScript,
			ScriptCode::WebAssembly(_) => ScriptKind::WebAssembly,
		}
	}
}
