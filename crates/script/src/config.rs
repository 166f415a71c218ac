// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
	/// A context's store or JavaScript context is rebuilt once it holds more
	/// discarded instances or modules than this.
	pub stale_instance_limit: usize,
	/// How long shutdown waits for a busy context before giving up on it.
	pub close_timeout: Duration,
	/// Worker threads of the runtime driving sink requests.
	pub io_threads: usize,
}

impl RuntimeConfig {
	pub fn stale_instance_limit(mut self, limit: usize) -> Self {
		self.stale_instance_limit = limit;
		self
	}

	pub fn close_timeout(mut self, timeout: Duration) -> Self {
		self.close_timeout = timeout;
		self
	}

	pub fn io_threads(mut self, threads: usize) -> Self {
		self.io_threads = threads;
		self
	}
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			stale_instance_limit: 64,
			close_timeout: Duration::from_secs(1),
			io_threads: 2,
		}
	}
}
