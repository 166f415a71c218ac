// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
	#[error("failed to watch {path}: {source}")]
	Notify {
		path: PathBuf,
		#[source]
		source: notify::Error,
	},

	#[error("neither {0} nor any of its ancestors exist")]
	NoExistingAncestor(PathBuf),

	#[error("failed to resolve {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to spawn thread {name}: {source}")]
	Spawn {
		name: String,
		#[source]
		source: std::io::Error,
	},

	#[error("watcher is closed")]
	Closed,
}

pub type Result<T> = std::result::Result<T, WatchError>;
