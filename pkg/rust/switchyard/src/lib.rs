// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Composition root: wires the event log, script runtime, scheduler, file
//! watcher and change pipeline into one [`Switchyard`] instance.

mod builder;
mod config;
mod container;
mod error;
mod switchyard;

pub use builder::SwitchyardBuilder;
pub use config::{DEFAULT_CONFIG_FILE, ServerConfig};
pub use container::{ScriptContainer, ScriptEntry, discover, locate, resolve};
pub use error::{Error, Result};
pub use switchyard::Switchyard;
pub use switchyard_cdc as cdc;
pub use switchyard_core as core;
pub use switchyard_log as log;
pub use switchyard_scheduler as scheduler;
pub use switchyard_script as script;
pub use switchyard_sink as sink;
pub use switchyard_sub_tracing as tracing;
pub use switchyard_watch as watch;

/// Default configuration values
pub mod defaults {
	use std::time::Duration;

	/// How often consumed event log segments are deleted.
	pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

	/// Request timeout of the default HTTP sink.
	pub const SINK_TIMEOUT: Duration = Duration::from_secs(30);
}
