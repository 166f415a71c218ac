// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use switchyard_core::{ConfigError, ScriptError};
use switchyard_log::LogError;
use switchyard_scheduler::SchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum CdcError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Log(#[from] LogError),

	#[error(transparent)]
	Scheduler(#[from] SchedulerError),

	#[error(transparent)]
	Script(#[from] ScriptError),

	#[error("connector {name} failed: {message}")]
	Connector {
		name: String,
		message: String,
	},

	#[error("failed to spawn thread {name}: {source}")]
	Spawn {
		name: String,
		#[source]
		source: std::io::Error,
	},

	#[error("change pipeline is shut down")]
	Shutdown,
}

pub type Result<T> = std::result::Result<T, CdcError>;

#[cfg(test)]
mod tests {
	use std::io;

	use super::*;

	#[test]
	fn test_spawn_failure_names_the_thread() {
		let err = CdcError::Spawn {
			name: "reader-orders".to_string(),
			source: io::Error::new(io::ErrorKind::WouldBlock, "resource temporarily unavailable"),
		};
		assert_eq!(err.to_string(), "failed to spawn thread reader-orders: resource temporarily unavailable");
		assert!(std::error::Error::source(&err).is_some());
	}
}
