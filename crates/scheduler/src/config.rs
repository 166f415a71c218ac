// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	/// Worker threads. Defaults to the available parallelism.
	pub threads: usize,
	/// How long `close` waits for in-flight work.
	pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			threads: num_cpus::get(),
			shutdown_timeout: Duration::from_secs(5),
		}
	}
}

impl SchedulerConfig {
	pub fn threads(mut self, threads: usize) -> Self {
		self.threads = threads.max(1);
		self
	}

	pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
		self.shutdown_timeout = timeout;
		self
	}
}
