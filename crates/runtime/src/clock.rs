// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{SystemTime, UNIX_EPOCH},
};

/// Source of wall-clock milliseconds since the Unix epoch.
///
/// Tests use [`Clock::mock`] to drive time-based behaviour such as segment
/// rolling deterministically.
#[derive(Debug, Clone, Default)]
pub enum Clock {
	#[default]
	System,
	Mock(Arc<AtomicU64>),
}

impl Clock {
	pub fn mock(millis: u64) -> Self {
		Clock::Mock(Arc::new(AtomicU64::new(millis)))
	}

	pub fn now_millis(&self) -> u64 {
		match self {
			Clock::System => {
				SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
			}
			Clock::Mock(millis) => millis.load(Ordering::Acquire),
		}
	}

	/// No-op for the system clock.
	pub fn set(&self, millis: u64) {
		if let Clock::Mock(current) = self {
			current.store(millis, Ordering::Release);
		}
	}

	/// No-op for the system clock.
	pub fn advance(&self, millis: u64) {
		if let Clock::Mock(current) = self {
			current.fetch_add(millis, Ordering::AcqRel);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_mock_clock_is_shared_between_clones() {
		let clock = Clock::mock(1000);
		let clone = clock.clone();
		clock.advance(500);
		assert_eq!(clone.now_millis(), 1500);
		clone.set(42);
		assert_eq!(clock.now_millis(), 42);
	}

	#[test]
	fn test_system_clock_moves_forward() {
		let clock = Clock::System;
		let a = clock.now_millis();
		clock.set(0);
		assert!(clock.now_millis() >= a);
	}
}
