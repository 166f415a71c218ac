// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use switchyard_core::SourceIdentity;
use tracing::info;

use crate::{EventLog, EventLogConfig, Result};

/// One event log per source, opened on first use under `<root>/<identity dir>`.
pub struct LogRegistry {
	root: PathBuf,
	config: EventLogConfig,
	logs: DashMap<SourceIdentity, Arc<EventLog>>,
	opening: Mutex<()>,
}

impl LogRegistry {
	pub fn new(root: impl Into<PathBuf>, config: EventLogConfig) -> Self {
		Self {
			root: root.into(),
			config,
			logs: DashMap::new(),
			opening: Mutex::new(()),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn get_or_open(&self, identity: &SourceIdentity) -> Result<Arc<EventLog>> {
		if let Some(log) = self.logs.get(identity) {
			return Ok(log.value().clone());
		}

		let _opening = self.opening.lock();
		if let Some(log) = self.logs.get(identity) {
			return Ok(log.value().clone());
		}

		let log = Arc::new(EventLog::open(self.root.join(identity.dir_name()), self.config.clone())?);
		info!(source = %identity, dir = %log.dir().display(), "event log ready");
		self.logs.insert(identity.clone(), log.clone());
		Ok(log)
	}

	pub fn get(&self, identity: &SourceIdentity) -> Option<Arc<EventLog>> {
		self.logs.get(identity).map(|log| log.value().clone())
	}

	pub fn logs(&self) -> Vec<(SourceIdentity, Arc<EventLog>)> {
		self.logs.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
	}

	/// Prunes every open log, returning the total number of removed segments.
	pub fn prune_all(&self) -> Result<usize> {
		let mut removed = 0;
		for (_, log) in self.logs() {
			removed += log.prune()?;
		}
		Ok(removed)
	}
}
