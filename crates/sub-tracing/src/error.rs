// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
	#[error("invalid log filter `{filter}`: {message}")]
	Filter {
		filter: String,
		message: String,
	},

	#[error("failed to open log file {path}: {source}")]
	File {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("a global tracing subscriber is already installed")]
	AlreadyInitialized,
}
