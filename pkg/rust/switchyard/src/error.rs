// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

use switchyard_cdc::CdcError;
use switchyard_core::{ConfigError, ScriptError};
use switchyard_log::LogError;
use switchyard_scheduler::SchedulerError;
use switchyard_sink::SinkError;
use switchyard_sub_tracing::TracingError;
use switchyard_watch::WatchError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Log(#[from] LogError),

	#[error(transparent)]
	Script(#[from] ScriptError),

	#[error(transparent)]
	Scheduler(#[from] SchedulerError),

	#[error(transparent)]
	Watch(#[from] WatchError),

	#[error(transparent)]
	Cdc(#[from] CdcError),

	#[error(transparent)]
	Sink(#[from] SinkError),

	#[error(transparent)]
	Tracing(#[from] TracingError),

	#[error("invalid configuration file {path}: {source}")]
	ConfigFile {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("{path}: {source}")]
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
}

pub type Result<T> = std::result::Result<T, Error>;
