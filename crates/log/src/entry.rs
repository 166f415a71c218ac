// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use serde::{Deserialize, Serialize};

use crate::{LogError, Result};

/// Location of a record: segment id plus byte offset of its frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
	pub segment: u64,
	pub offset: u64,
}

impl Position {
	pub fn new(segment: u64, offset: u64) -> Self {
		Self {
			segment,
			offset,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
	/// Where the record starts.
	pub position: Position,
	/// Where the cursor stands after consuming the record.
	pub next: Position,
	pub payload: Vec<u8>,
}

impl LogEntry {
	pub fn text(&self) -> Option<&str> {
		std::str::from_utf8(&self.payload).ok()
	}

	pub fn into_text(self) -> Result<String> {
		let position = self.position;
		String::from_utf8(self.payload).map_err(|e| {
			LogError::Codec(format!(
				"record at segment {} offset {} is not UTF-8: {}",
				position.segment, position.offset, e
			))
		})
	}
}
