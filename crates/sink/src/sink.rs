// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use futures_util::future::BoxFuture;

use crate::{Result, SinkAction, SinkRequest};

/// Downstream target of script side effects.
///
/// Both operations resolve to the response body. Empty `records` resolve to
/// an empty body without any I/O.
pub trait Sink: Send + Sync + 'static {
	fn put(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>>;

	fn delete(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>>;

	fn submit(&self, action: SinkAction, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		match action {
			SinkAction::Put => self.put(request),
			SinkAction::Delete => self.delete(request),
		}
	}
}
