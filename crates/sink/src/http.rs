// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::{debug, instrument};

use crate::{
	Result, Sink, SinkAction, SinkError, SinkRequest,
	plan::{Method, PlannedRequest, plan},
};

/// Elasticsearch-compatible HTTP sink.
#[derive(Clone)]
pub struct HttpSink {
	client: Client,
}

impl HttpSink {
	pub fn new(timeout: Duration) -> Result<Self> {
		let client =
			Client::builder().timeout(timeout).build().map_err(|e| SinkError::Transport(e.to_string()))?;
		Ok(Self {
			client,
		})
	}

	pub fn with_client(client: Client) -> Self {
		Self {
			client,
		}
	}

	fn dispatch(&self, action: SinkAction, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		let planned = plan(action, &request);
		let client = self.client.clone();
		Box::pin(async move {
			match planned? {
				Some(planned) => send(client, planned).await,
				None => {
					debug!("no records, skipping request");
					Ok(String::new())
				}
			}
		})
	}
}

#[instrument(name = "sink::send", level = "debug", skip_all, fields(method = planned.method.as_str(), url = %planned.url))]
async fn send(client: Client, planned: PlannedRequest) -> Result<String> {
	let method = match planned.method {
		Method::Put => reqwest::Method::PUT,
		Method::Post => reqwest::Method::POST,
		Method::Delete => reqwest::Method::DELETE,
	};

	let mut builder = client
		.request(method, &planned.url)
		.header(CONTENT_TYPE, planned.content_type)
		.basic_auth(&planned.credentials.username, Some(&planned.credentials.password));
	if let Some(body) = planned.body {
		builder = builder.body(body);
	}

	let response = builder.send().await.map_err(|e| SinkError::Transport(e.to_string()))?;
	let status = response.status();
	let body = response.text().await.map_err(|e| SinkError::Transport(e.to_string()))?;
	if !status.is_success() {
		return Err(SinkError::Status {
			status: status.as_u16(),
			body,
		});
	}
	Ok(body)
}

impl Sink for HttpSink {
	fn put(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		self.dispatch(SinkAction::Put, request)
	}

	fn delete(&self, request: SinkRequest) -> BoxFuture<'static, Result<String>> {
		self.dispatch(SinkAction::Delete, request)
	}
}
