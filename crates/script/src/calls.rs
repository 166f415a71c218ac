// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;
use switchyard_sink::{Sink, SinkAction, SinkError, SinkRequest};
use tokio::{runtime::Handle, task::JoinHandle};

type Pending = JoinHandle<Result<String, SinkError>>;

/// Sink operations one invocation started, keyed by the handle the script
/// holds. Operations run on the I/O runtime as soon as they are started.
pub(crate) struct SinkCalls {
	sink: Arc<dyn Sink>,
	io: Handle,
	pending: BTreeMap<i32, Pending>,
	next: i32,
}

impl SinkCalls {
	pub(crate) fn new(sink: Arc<dyn Sink>, io: Handle) -> Self {
		Self {
			sink,
			io,
			pending: BTreeMap::new(),
			next: 1,
		}
	}

	/// Validates the JSON parameters and starts the operation.
	pub(crate) fn start(&mut self, action: SinkAction, params: &[u8]) -> Result<i32, String> {
		let params = serde_json::from_slice::<Value>(params).map_err(|e| format!("invalid sink parameters: {}", e))?;
		let request = SinkRequest::from_params(&params).map_err(|e| e.to_string())?;

		let operation = self.io.spawn(self.sink.submit(action, request));
		let id = self.next;
		self.next = self.next.checked_add(1).unwrap_or(1);
		self.pending.insert(id, operation);
		Ok(id)
	}

	/// Blocks until operation `id` finishes and returns its response body.
	pub(crate) fn wait(&mut self, id: i32) -> Result<String, String> {
		let operation = self.pending.remove(&id).ok_or_else(|| format!("unknown sink operation {}", id))?;
		match self.io.block_on(operation) {
			Ok(Ok(body)) => Ok(body),
			Ok(Err(e)) => Err(e.to_string()),
			Err(e) => Err(format!("sink operation {} aborted: {}", id, e)),
		}
	}

	/// Blocks until every operation nobody waited for has finished. Returns
	/// the failure messages.
	pub(crate) fn settle(&mut self) -> Vec<String> {
		let ids: Vec<i32> = self.pending.keys().copied().collect();
		ids.into_iter().filter_map(|id| self.wait(id).err()).collect()
	}

	pub(crate) fn clear(&mut self) {
		self.pending.clear();
	}
}
