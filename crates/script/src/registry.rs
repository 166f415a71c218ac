// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use dashmap::DashMap;
use switchyard_core::{Interest, ScriptId};

use crate::ScriptCode;

/// A loaded script at one version.
pub struct ScriptDescriptor {
	pub id: ScriptId,
	pub path: PathBuf,
	pub code: ScriptCode,
	pub version: u64,
	pub interest: Interest,
}

impl std::fmt::Debug for ScriptDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScriptDescriptor")
			.field("id", &self.id)
			.field("path", &self.path)
			.field("kind", &self.code.kind())
			.field("version", &self.version)
			.field("interest", &self.interest)
			.finish()
	}
}

/// Registered scripts. Versions come from one counter and only grow.
#[derive(Default)]
pub struct ScriptRegistry {
	scripts: DashMap<ScriptId, Arc<ScriptDescriptor>>,
	versions: AtomicU64,
}

impl ScriptRegistry {
	pub fn next_version(&self) -> u64 {
		self.versions.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn insert(&self, descriptor: ScriptDescriptor) -> Arc<ScriptDescriptor> {
		let descriptor = Arc::new(descriptor);
		self.scripts.insert(descriptor.id.clone(), descriptor.clone());
		descriptor
	}

	pub fn get(&self, id: &ScriptId) -> Option<Arc<ScriptDescriptor>> {
		self.scripts.get(id).map(|d| d.value().clone())
	}

	pub fn remove(&self, id: &ScriptId) -> Option<Arc<ScriptDescriptor>> {
		self.scripts.remove(id).map(|(_, d)| d)
	}

	pub fn ids(&self) -> Vec<ScriptId> {
		self.scripts.iter().map(|e| e.key().clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.scripts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.scripts.is_empty()
	}

	pub fn clear(&self) {
		self.scripts.clear();
	}
}
