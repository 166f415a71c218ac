// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use switchyard_core::SourceIdentity;
use switchyard_log::{EventLog, Position};
use tracing::trace;

use crate::{Normalizer, Result};

/// Receives one source's raw change events and appends the accepted ones
/// verbatim to its event log.
///
/// Appending wakes the log's readers. Nothing here waits on scripts or sinks.
#[derive(Clone)]
pub struct RecordHandler {
	identity: SourceIdentity,
	log: Arc<EventLog>,
	normalizer: Arc<Normalizer>,
}

impl RecordHandler {
	pub fn new(identity: SourceIdentity, log: Arc<EventLog>) -> Self {
		Self {
			identity,
			log,
			normalizer: Arc::new(Normalizer::new()),
		}
	}

	/// Returns where the record was stored, or `None` when it was dropped.
	pub fn handle(&self, raw: Option<&str>) -> Result<Option<Position>> {
		let Some(record) = self.normalizer.accept(raw) else {
			return Ok(None);
		};
		let position = self.log.append(record.as_bytes())?;
		trace!(
			source = %self.identity,
			db = record.db().unwrap_or_default(),
			table = record.table().unwrap_or_default(),
			segment = position.segment,
			offset = position.offset,
			"record appended"
		);
		Ok(Some(position))
	}

	pub fn identity(&self) -> &SourceIdentity {
		&self.identity
	}

	pub fn log(&self) -> &Arc<EventLog> {
		&self.log
	}

	pub fn normalizer(&self) -> &Normalizer {
		&self.normalizer
	}
}
