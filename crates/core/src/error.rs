// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::ScriptId;

/// Invalid configuration, surfaced synchronously to whoever triggered the action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error("unsupported database kind: {0}")]
	UnsupportedDatabase(String),

	#[error("MySQL server-id must be between 1 and 2^32-1 (source {source_name})")]
	InvalidServerId {
		source_name: String,
	},

	#[error("source {source_name} requires at least one database")]
	MissingDatabase {
		source_name: String,
	},

	#[error("{field} must not be blank")]
	Blank {
		field: &'static str,
	},
}

/// Failure of a single script execution or registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
	#[error("script {script} is not registered")]
	NotRegistered {
		script: ScriptId,
	},

	#[error("script {script} failed to load: {message}")]
	Load {
		script: ScriptId,
		message: String,
	},

	#[error("script {script} is missing export `{export}`")]
	MissingExport {
		script: ScriptId,
		export: &'static str,
	},

	#[error("script {script} initialisation failed: {message}")]
	Init {
		script: ScriptId,
		message: String,
	},

	#[error("script {script} rejected: {message}")]
	Rejected {
		script: ScriptId,
		message: String,
	},

	#[error("script {script} panicked: {message}")]
	Panicked {
		script: ScriptId,
		message: String,
	},

	#[error("script {script} execution was abandoned")]
	Abandoned {
		script: ScriptId,
	},

	#[error("script engine error: {0}")]
	Engine(String),

	#[error("script runtime is shut down")]
	Shutdown,
}

impl ScriptError {
	pub fn script(&self) -> Option<&ScriptId> {
		match self {
			ScriptError::NotRegistered {
				script,
			}
			| ScriptError::Load {
				script,
				..
			}
			| ScriptError::MissingExport {
				script,
				..
			}
			| ScriptError::Init {
				script,
				..
			}
			| ScriptError::Rejected {
				script,
				..
			}
			| ScriptError::Panicked {
				script,
				..
			}
			| ScriptError::Abandoned {
				script,
			} => Some(script),
			ScriptError::Engine(_) | ScriptError::Shutdown => None,
		}
	}
}
