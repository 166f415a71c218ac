// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WatcherConfig {
	/// Time a path must stay quiet before its latest event is dispatched.
	pub quiet_period: Duration,
	pub timer_threads: usize,
}

impl Default for WatcherConfig {
	fn default() -> Self {
		Self {
			quiet_period: DEFAULT_QUIET_PERIOD,
			timer_threads: 2,
		}
	}
}

impl WatcherConfig {
	pub fn quiet_period(mut self, quiet_period: Duration) -> Self {
		self.quiet_period = quiet_period;
		self
	}

	pub fn timer_threads(mut self, threads: usize) -> Self {
		self.timer_threads = threads.max(1);
		self
	}
}
