// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs, io,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::{Deserialize, Serialize};
use switchyard_core::{SourceConfig, SystemConfig};
use tracing::debug;

use crate::{Error, Result, SwitchyardBuilder};

pub const DEFAULT_CONFIG_FILE: &str = "switchyard.json";

/// Configuration file of the `switchyard-server` binary.
///
/// ```json
/// {
///   "system": { "runtime_directory": "/var/lib/switchyard" },
///   "sources": [
///     { "name": "shop", "kind": "mysql", "host": "db", "port": 3306,
///       "username": "cdc", "password": "secret", "server_id": 5400 }
///   ],
///   "serial": true,
///   "log_level": "info"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub system: SystemConfig,
	pub sources: Vec<SourceConfig>,
	/// Process each script's records one at a time, in log order.
	pub serial: bool,
	/// Script worker threads. Defaults to the number of CPUs.
	pub threads: Option<usize>,
	pub log_level: String,
	/// Filter directives overriding `log_level` and `RUST_LOG`.
	pub log_filter: Option<String>,
	pub sink_timeout_secs: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			system: SystemConfig::default(),
			sources: Vec::new(),
			serial: true,
			threads: None,
			log_level: "info".to_string(),
			log_filter: None,
			sink_timeout_secs: crate::defaults::SINK_TIMEOUT.as_secs(),
		}
	}
}

impl ServerConfig {
	pub fn from_json(path: &Path, json: &str) -> Result<Self> {
		serde_json::from_str(json).map_err(|source| Error::ConfigFile {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Reads `path`, falling back to the defaults when it does not exist.
	pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		match fs::read_to_string(path) {
			Ok(json) => Self::from_json(path, &json),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				debug!(path = %path.display(), "no configuration file, using defaults");
				Ok(Self::default())
			}
			Err(source) => Err(Error::Io {
				path: path.to_path_buf(),
				source,
			}),
		}
	}

	pub fn sink_timeout(&self) -> Duration {
		Duration::from_secs(self.sink_timeout_secs)
	}

	pub fn runtime_directory(&self) -> PathBuf {
		self.system.runtime_directory.clone()
	}

	/// A builder with this configuration and an HTTP sink applied.
	pub fn into_builder(self) -> SwitchyardBuilder {
		let mut builder = SwitchyardBuilder::new(self.system)
			.with_sources(self.sources)
			.serial(self.serial)
			.with_sink_timeout(Duration::from_secs(self.sink_timeout_secs));
		if let Some(threads) = self.threads {
			builder = builder.with_threads(threads);
		}

		let level = self.log_level;
		let filter = self.log_filter;
		builder.with_tracing(move |tracing| {
			let tracing = tracing.level(level);
			match filter {
				Some(filter) => tracing.filter(filter),
				None => tracing,
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use switchyard_core::DbKind;

	use super::*;

	#[test]
	fn test_missing_fields_use_defaults() {
		let config = ServerConfig::from_json(
			Path::new("switchyard.json"),
			r#"{"system":{"runtime_directory":"/srv/switchyard"},"threads":4}"#,
		)
		.unwrap();

		assert_eq!(config.runtime_directory(), PathBuf::from("/srv/switchyard"));
		assert_eq!(config.threads, Some(4));
		assert!(config.serial);
		assert!(config.sources.is_empty());
		assert_eq!(config.log_level, "info");
		assert_eq!(config.sink_timeout(), Duration::from_secs(30));
	}

	#[test]
	fn test_sources_are_parsed() {
		let config = ServerConfig::from_json(
			Path::new("switchyard.json"),
			r#"{"sources":[{"name":"shop","kind":"mysql","host":"db","port":3306,"username":"cdc","password":"pw","server_id":7}],"serial":false}"#,
		)
		.unwrap();

		assert!(!config.serial);
		assert_eq!(config.sources.len(), 1);
		assert_eq!(config.sources[0].kind, DbKind::Mysql);
		assert_eq!(config.sources[0].server_id, Some(7));
	}

	#[test]
	fn test_malformed_file_is_reported() {
		let err = ServerConfig::from_json(Path::new("bad.json"), "{").unwrap_err();
		assert!(matches!(err, Error::ConfigFile { ref path, .. } if path == Path::new("bad.json")));
	}

	#[test]
	fn test_absent_file_falls_back_to_defaults() {
		switchyard_testing::temp_dir(|dir| {
			let config = ServerConfig::load_or_default(dir.join(DEFAULT_CONFIG_FILE)).unwrap();
			assert_eq!(config, ServerConfig::default());
			Ok(())
		})
		.unwrap();
	}
}
