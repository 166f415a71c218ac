// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeSet,
	fs, io,
	path::{Component, Path, PathBuf},
};

use switchyard_core::ScriptId;
use switchyard_script::ScriptKind;

const EXTENSIONS: [&str; 4] = ScriptKind::EXTENSIONS;

const INDEX: &str = "index";

/// A script found in the script directory and the file it is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
	pub id: ScriptId,
	pub path: PathBuf,
}

/// Lists every script in `dir`.
///
/// A top-level `name.js` or `name.mjs` is the script `name`, and so is a
/// directory `name/` holding `index.js` or `index.mjs`. WebAssembly scripts
/// follow the same layout with `.wasm` and `.wat`. A directory wins over a
/// top-level file of the same name; `.js` wins over `.mjs`, `.wasm` and `.wat`.
pub fn discover(dir: &Path) -> io::Result<Vec<ScriptEntry>> {
	let mut ids = BTreeSet::new();
	for entry in fs::read_dir(dir)? {
		if let Some(id) = locate(dir, &entry?.path()) {
			ids.insert(id);
		}
	}
	Ok(ids
		.into_iter()
		.filter_map(|id| {
			let path = resolve(dir, &id)?;
			Some(ScriptEntry {
				id,
				path,
			})
		})
		.collect())
}

/// Names the script that a change to `path` affects.
///
/// Anything below a subdirectory belongs to the script named after the
/// subdirectory. The path does not have to exist any more.
pub fn locate(dir: &Path, path: &Path) -> Option<ScriptId> {
	let relative = path.strip_prefix(dir).ok()?;
	let mut components = relative.components();
	let Component::Normal(first) = components.next()? else {
		return None;
	};
	let name = first.to_str()?;
	if name.starts_with('.') {
		return None;
	}
	if components.next().is_some() {
		return Some(ScriptId::new(name));
	}

	let top = Path::new(first);
	if is_script_file(top) {
		return top.file_stem()?.to_str().map(ScriptId::new);
	}
	let full = dir.join(first);
	if full.is_dir() || !full.exists() {
		return Some(ScriptId::new(name));
	}
	None
}

/// The file `script` currently loads from, if any.
pub fn resolve(dir: &Path, script: &ScriptId) -> Option<PathBuf> {
	let nested = dir.join(script.as_str());
	if nested.is_dir() {
		let index = EXTENSIONS.iter().map(|ext| nested.join(format!("{}.{}", INDEX, ext))).find(|p| p.is_file());
		if index.is_some() {
			return index;
		}
	}
	EXTENSIONS.iter().map(|ext| dir.join(format!("{}.{}", script, ext))).find(|p| p.is_file())
}

fn is_script_file(path: &Path) -> bool {
	path.extension().and_then(|e| e.to_str()).is_some_and(|ext| EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn touch(path: PathBuf) -> io::Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, "(module)")
	}

	#[test]
	fn test_discover_layouts() {
		switchyard_testing::temp_dir(|dir| {
			touch(dir.join("orders.js"))?;
			touch(dir.join("customers.wasm"))?;
			touch(dir.join("inventory").join("index.mjs"))?;
			touch(dir.join("inventory").join("helpers.js"))?;
			touch(dir.join("drafts").join("notes.txt"))?;
			touch(dir.join("README.md"))?;
			touch(dir.join(".orders.wat.swp"))?;

			let entries = discover(dir)?;
			assert_eq!(
				entries,
				vec![
					ScriptEntry {
						id: ScriptId::new("customers"),
						path: dir.join("customers.wasm"),
					},
					ScriptEntry {
						id: ScriptId::new("inventory"),
						path: dir.join("inventory").join("index.mjs"),
					},
					ScriptEntry {
						id: ScriptId::new("orders"),
						path: dir.join("orders.js"),
					},
				]
			);
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_preferences() {
		switchyard_testing::temp_dir(|dir| {
			touch(dir.join("orders.wat"))?;
			touch(dir.join("orders.wasm"))?;
			assert_eq!(resolve(dir, &ScriptId::new("orders")), Some(dir.join("orders.wasm")));

			touch(dir.join("orders.mjs"))?;
			assert_eq!(resolve(dir, &ScriptId::new("orders")), Some(dir.join("orders.mjs")));
			touch(dir.join("orders.js"))?;
			assert_eq!(resolve(dir, &ScriptId::new("orders")), Some(dir.join("orders.js")));

			touch(dir.join("orders").join("index.wat"))?;
			assert_eq!(resolve(dir, &ScriptId::new("orders")), Some(dir.join("orders").join("index.wat")));
			touch(dir.join("orders").join("index.js"))?;
			assert_eq!(resolve(dir, &ScriptId::new("orders")), Some(dir.join("orders").join("index.js")));
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_locate_changed_paths() {
		switchyard_testing::temp_dir(|dir| {
			touch(dir.join("inventory").join("index.js"))?;
			touch(dir.join("README.md"))?;

			let locate = |path: PathBuf| locate(dir, &path);
			assert_eq!(locate(dir.join("orders.js")), Some(ScriptId::new("orders")));
			assert_eq!(locate(dir.join("orders.wat")), Some(ScriptId::new("orders")));
			assert_eq!(locate(dir.join("inventory").join("lib").join("util.js")), Some(ScriptId::new("inventory")));
			assert_eq!(locate(dir.join("inventory")), Some(ScriptId::new("inventory")));
			// removed directories still name their script
			assert_eq!(locate(dir.join("gone")), Some(ScriptId::new("gone")));
			assert_eq!(locate(dir.join("README.md")), None);
			assert_eq!(locate(dir.join(".hidden.wat")), None);
			assert_eq!(locate(PathBuf::from("/elsewhere/orders.wat")), None);
			assert_eq!(locate(dir.to_path_buf()), None);
			Ok(())
		})
		.unwrap();
	}
}
