// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;

use crate::{
	Result, Sink, SinkAction, SinkError, SinkRequest,
	plan::{PlannedRequest, plan},
};

/// Sink that plans requests without sending them.
///
/// Every planned request is recorded and answered with a canned body. Used
/// for dry runs and in tests.
#[derive(Clone, Default)]
pub struct MemorySink {
	inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
	requests: Vec<PlannedRequest>,
	failure: Option<SinkError>,
}

impl MemorySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn requests(&self) -> Vec<PlannedRequest> {
		self.inner.lock().requests.clone()
	}

	pub fn clear(&self) {
		self.inner.lock().requests.clear();
	}

	/// Makes every following request fail with `error`.
	pub fn fail_with(&self, error: SinkError) {
		self.inner.lock().failure = Some(error);
	}

	fn record(&self, action: SinkAction, request: SinkRequest) -> Result<String> {
		let Some(planned) = plan(action, &request)? else {
			return Ok(String::new());
		};
		let mut state = self.inner.lock();
		if let Some(error) = state.failure.clone() {
			return Err(error);
		}
		let body = format!(r#"{{"result":"{}","url":"{}"}}"#, planned.method.as_str(), planned.url);
		state.requests.push(planned);
		Ok(body)
	}
}

impl Sink for MemorySink {
	fn put(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		Box::pin(future::ready(self.record(SinkAction::Put, request)))
	}

	fn delete(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		Box::pin(future::ready(self.record(SinkAction::Delete, request)))
	}
}
