// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

/// Exponential delay between idle polls, doubling up to a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
	initial: Duration,
	max: Duration,
	current: Duration,
}

impl Backoff {
	pub fn new(initial: Duration, max: Duration) -> Self {
		Self {
			initial,
			max,
			current: initial,
		}
	}

	/// Returns the delay to wait now and doubles the next one.
	pub fn next_delay(&mut self) -> Duration {
		let delay = self.current;
		self.current = (self.current * 2).min(self.max);
		delay
	}

	/// Called after productive work.
	pub fn reset(&mut self) {
		self.current = self.initial;
	}

	pub fn current(&self) -> Duration {
		self.current
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Self::new(Duration::from_millis(1), Duration::from_millis(100))
	}
}
