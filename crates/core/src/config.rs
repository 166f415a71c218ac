// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeSet,
	fs, io,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DbKind, SourceIdentity};

/// Runtime directory layout.
///
/// ```text
/// <runtime>/
///   scripts/   script files (`name.js`, `name/index.js`, `name.wasm`, ...)
///   offset/    connector checkpoints and schema history
///   queue/     event log segments and cursors
///   logs/      operational logs
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
	pub runtime_directory: PathBuf,
}

impl SystemConfig {
	pub fn new(runtime_directory: impl Into<PathBuf>) -> Self {
		Self {
			runtime_directory: runtime_directory.into(),
		}
	}

	pub fn runtime_directory(&self) -> &Path {
		&self.runtime_directory
	}

	pub fn script_directory(&self) -> PathBuf {
		self.runtime_directory.join("scripts")
	}

	pub fn offset_directory(&self) -> PathBuf {
		self.runtime_directory.join("offset")
	}

	pub fn queue_directory(&self) -> PathBuf {
		self.runtime_directory.join("queue")
	}

	pub fn log_directory(&self) -> PathBuf {
		self.runtime_directory.join("logs")
	}

	pub fn create_directories(&self) -> io::Result<()> {
		for dir in [self.script_directory(), self.offset_directory(), self.queue_directory(), self.log_directory()]
		{
			fs::create_dir_all(dir)?;
		}
		Ok(())
	}
}

impl Default for SystemConfig {
	fn default() -> Self {
		let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::new(cwd.join("data"))
	}
}

/// A database instance to capture changes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceConfig {
	pub name: String,
	pub kind: DbKind,
	#[serde(default)]
	pub databases: BTreeSet<String>,
	#[serde(default)]
	pub tables: BTreeSet<String>,
	pub host: String,
	pub port: u16,
	pub username: String,
	pub password: String,
	#[serde(default)]
	pub server_id: Option<u32>,
}

impl SourceConfig {
	pub fn identity(&self) -> SourceIdentity {
		SourceIdentity {
			kind: self.kind,
			host: self.host.clone(),
			port: self.port,
			username: self.username.clone(),
			password: self.password.clone(),
			server_id: self.server_id,
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.name.trim().is_empty() {
			return Err(ConfigError::Blank {
				field: "name",
			});
		}
		if self.host.trim().is_empty() {
			return Err(ConfigError::Blank {
				field: "host",
			});
		}
		match self.kind {
			DbKind::Mysql => {
				if !matches!(self.server_id, Some(id) if id > 0) {
					return Err(ConfigError::InvalidServerId {
						source_name: self.name.clone(),
					});
				}
			}
			DbKind::Postgresql => {
				if self.databases.is_empty() {
					return Err(ConfigError::MissingDatabase {
						source_name: self.name.clone(),
					});
				}
			}
		}
		Ok(())
	}
}
