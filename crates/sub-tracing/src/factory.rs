// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::Path;

use crate::{TracingBuilder, TracingError};

/// Configuration function applied on top of the defaults.
pub type TracingConfigurator = Box<dyn FnOnce(TracingBuilder) -> TracingBuilder + Send>;

/// Installs logging for a Switchyard instance rooted at a log directory.
pub struct TracingFactory {
	configurator: Option<TracingConfigurator>,
}

impl TracingFactory {
	pub fn new() -> Self {
		Self {
			configurator: None,
		}
	}

	pub fn with_configurator<F>(configurator: F) -> Self
	where
		F: FnOnce(TracingBuilder) -> TracingBuilder + Send + 'static,
	{
		Self {
			configurator: Some(Box::new(configurator)),
		}
	}

	/// Builds the configuration: JSON lines under `log_dir`, then the configurator.
	pub fn builder(self, log_dir: &Path) -> TracingBuilder {
		let builder = TracingBuilder::new().log_directory(log_dir);
		match self.configurator {
			Some(configurator) => configurator(builder),
			None => builder,
		}
	}

	pub fn create(self, log_dir: &Path) -> Result<(), TracingError> {
		self.builder(log_dir).init()
	}
}

impl Default for TracingFactory {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_configurator_runs_after_defaults() {
		let builder = TracingFactory::with_configurator(|b| b.json_file("/tmp/elsewhere.log"))
			.builder(Path::new("/srv/logs"));
		assert_eq!(builder.json_file_path(), Some(Path::new("/tmp/elsewhere.log")));

		let builder = TracingFactory::new().builder(Path::new("/srv/logs"));
		assert_eq!(builder.json_file_path(), Some(Path::new("/srv/logs/switchyard.log")));
	}
}
