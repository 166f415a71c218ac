// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use switchyard_runtime::Clock;

/// Default segment roll interval: one hour.
pub const DEFAULT_ROLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct EventLogConfig {
	/// Appends go to a new segment whenever `now / roll_interval` changes.
	pub roll_interval: Duration,
	/// `fsync` after every append.
	pub sync: bool,
	pub clock: Clock,
}

impl EventLogConfig {
	pub fn roll_interval(mut self, interval: Duration) -> Self {
		self.roll_interval = interval;
		self
	}

	pub fn sync(mut self, sync: bool) -> Self {
		self.sync = sync;
		self
	}

	pub fn clock(mut self, clock: Clock) -> Self {
		self.clock = clock;
		self
	}

	pub(crate) fn segment_for_now(&self) -> u64 {
		let interval = self.roll_interval.as_millis().max(1) as u64;
		self.clock.now_millis() / interval
	}
}

impl Default for EventLogConfig {
	fn default() -> Self {
		Self {
			roll_interval: DEFAULT_ROLL_INTERVAL,
			sync: false,
			clock: Clock::System,
		}
	}
}
