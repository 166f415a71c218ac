// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::{self, File, OpenOptions},
	path::{Path, PathBuf},
	sync::Mutex,
};

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::TracingError;

pub const DEFAULT_LOG_FILE: &str = "switchyard.log";

/// Configures the global subscriber: an env filter, a console layer and an
/// optional JSON file layer.
#[derive(Debug, Clone)]
pub struct TracingBuilder {
	level: String,
	filter: Option<String>,
	console: bool,
	ansi: bool,
	json_file: Option<PathBuf>,
}

impl Default for TracingBuilder {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			filter: None,
			console: true,
			ansi: true,
			json_file: None,
		}
	}
}

impl TracingBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Level used when neither an explicit filter nor `RUST_LOG` is set.
	pub fn level(mut self, level: impl Into<String>) -> Self {
		self.level = level.into();
		self
	}

	/// Filter directives, e.g. `switchyard_script=debug,info`. Overrides `RUST_LOG`.
	pub fn filter(mut self, directives: impl Into<String>) -> Self {
		self.filter = Some(directives.into());
		self
	}

	pub fn console(mut self, enabled: bool) -> Self {
		self.console = enabled;
		self
	}

	pub fn ansi(mut self, enabled: bool) -> Self {
		self.ansi = enabled;
		self
	}

	/// Also writes JSON lines to `path`, creating parent directories.
	pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.json_file = Some(path.into());
		self
	}

	/// Writes JSON lines to `switchyard.log` inside `dir`.
	pub fn log_directory(self, dir: impl AsRef<Path>) -> Self {
		let path = dir.as_ref().join(DEFAULT_LOG_FILE);
		self.json_file(path)
	}

	pub fn json_file_path(&self) -> Option<&Path> {
		self.json_file.as_deref()
	}

	pub fn env_filter(&self) -> Result<EnvFilter, TracingError> {
		match &self.filter {
			Some(directives) => EnvFilter::try_new(directives).map_err(|e| TracingError::Filter {
				filter: directives.clone(),
				message: e.to_string(),
			}),
			None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))),
		}
	}

	/// Installs the global subscriber.
	pub fn init(self) -> Result<(), TracingError> {
		let filter = self.env_filter()?;

		let file = match &self.json_file {
			Some(path) => Some(open(path)?),
			None => None,
		};

		let console = self.console.then(|| fmt::layer().with_ansi(self.ansi).with_thread_names(true));
		let json = file.map(|file| {
			fmt::layer().json().with_ansi(false).with_thread_names(true).with_writer(Mutex::new(file))
		});

		tracing_subscriber::registry()
			.with(filter)
			.with(console)
			.with(json)
			.try_init()
			.map_err(|_| TracingError::AlreadyInitialized)?;

		debug!(file = ?self.json_file, "tracing initialised");
		Ok(())
	}
}

fn open(path: &Path) -> Result<File, TracingError> {
	let failed = |source| TracingError::File {
		path: path.to_path_buf(),
		source,
	};
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(failed)?;
	}
	OpenOptions::new().create(true).append(true).open(path).map_err(failed)
}
