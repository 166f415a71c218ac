// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Maps a [`SinkRequest`] onto the HTTP call that carries it out.
//!
//! One record is addressed directly (`PUT|DELETE {url}/_doc/{id}`), several
//! go through `POST {url}/_bulk` as newline-delimited JSON.

use serde_json::Value;

use crate::{Result, SinkAction, SinkRequest};

pub const JSON: &str = "application/json";
pub const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
	Put,
	Post,
	Delete,
}

impl Method {
	pub fn as_str(&self) -> &'static str {
		match self {
			Method::Put => "PUT",
			Method::Post => "POST",
			Method::Delete => "DELETE",
		}
	}
}

/// Basic credentials, URL-encoded before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
	pub method: Method,
	pub url: String,
	pub content_type: &'static str,
	pub body: Option<String>,
	pub credentials: Credentials,
}

/// Returns `None` when there are no records to send.
pub fn plan(action: SinkAction, request: &SinkRequest) -> Result<Option<PlannedRequest>> {
	let base = request.url.trim_end_matches('/');
	let credentials = Credentials {
		username: urlencoding::encode(&request.username).into_owned(),
		password: urlencoding::encode(&request.password).into_owned(),
	};

	let planned = match request.records.as_slice() {
		[] => return Ok(None),
		[record] => {
			let id = request.document_id(record)?;
			let url = format!("{}/_doc/{}", base, urlencoding::encode(&path_segment(&id)));
			match action {
				SinkAction::Put => PlannedRequest {
					method: Method::Put,
					url,
					content_type: JSON,
					body: Some(Value::Object(record.clone()).to_string()),
					credentials,
				},
				SinkAction::Delete => PlannedRequest {
					method: Method::Delete,
					url,
					content_type: JSON,
					body: None,
					credentials,
				},
			}
		}
		records => {
			let mut body = String::new();
			for record in records {
				let id = request.document_id(record)?;
				match action {
					SinkAction::Put => {
						body.push_str(&format!("{{\"index\":{{\"_id\":{}}}}}\n", id));
						body.push_str(&Value::Object(record.clone()).to_string());
						body.push('\n');
					}
					SinkAction::Delete => {
						body.push_str(&format!("{{\"delete\":{{\"_id\":{}}}}}\n", id));
					}
				}
			}
			PlannedRequest {
				method: Method::Post,
				url: format!("{}/_bulk", base),
				content_type: NDJSON,
				body: Some(body),
				credentials,
			}
		}
	};
	Ok(Some(planned))
}

fn path_segment(id: &Value) -> String {
	match id {
		Value::String(id) => id.clone(),
		other => other.to_string(),
	}
}
