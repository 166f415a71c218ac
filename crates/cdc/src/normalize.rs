// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::atomic::{AtomicU64, Ordering};

use switchyard_core::{ChangeRecord, Rejection};
use tracing::{debug, warn};

/// Filters raw connector output down to row changes.
///
/// Tombstones, DDL, unknown operations and events without an `after` key are
/// dropped without error. Malformed JSON is dropped with a warning.
#[derive(Debug, Default)]
pub struct Normalizer {
	accepted: AtomicU64,
	dropped: AtomicU64,
}

impl Normalizer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn accept(&self, raw: Option<&str>) -> Option<ChangeRecord> {
		let Some(raw) = raw else {
			debug!("tombstone dropped");
			self.dropped.fetch_add(1, Ordering::Relaxed);
			return None;
		};

		match ChangeRecord::parse(raw) {
			Ok(record) => {
				self.accepted.fetch_add(1, Ordering::Relaxed);
				Some(record)
			}
			Err(Rejection::Malformed(e)) => {
				warn!(error = %e, "malformed change event dropped");
				self.dropped.fetch_add(1, Ordering::Relaxed);
				None
			}
			Err(reason) => {
				debug!(reason = %reason, "change event dropped");
				self.dropped.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}

	pub fn accepted(&self) -> u64 {
		self.accepted.load(Ordering::Relaxed)
	}

	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}
}
