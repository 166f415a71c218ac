// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use serde_json::{Map, Value};

use crate::{Result, SinkError};

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAction {
	Put,
	Delete,
}

/// A validated put or delete request against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRequest {
	pub url: String,
	pub username: String,
	pub password: String,
	pub id_key: String,
	pub records: Vec<Document>,
}

impl SinkRequest {
	/// Validates a parameter object of the shape
	/// `{"url", "username", "password", "idKey", "records"}`.
	///
	/// `records` may be an array of objects, a single object, or null/absent.
	pub fn from_params(params: &Value) -> Result<Self> {
		let Value::Object(params) = params else {
			return Err(SinkError::InvalidParameter {
				name: "params",
				message: "expected an object".to_string(),
			});
		};

		let url = required(params, "url")?;
		let username = required(params, "username")?;
		let password = required(params, "password")?;
		let id_key = required(params, "idKey")?;

		let records = match params.get("records") {
			None | Some(Value::Null) => Vec::new(),
			Some(Value::Object(record)) => vec![record.clone()],
			Some(Value::Array(items)) => items
				.iter()
				.map(|item| match item {
					Value::Object(record) => Ok(record.clone()),
					_ => Err(SinkError::InvalidParameter {
						name: "records",
						message: "elements must be objects".to_string(),
					}),
				})
				.collect::<Result<Vec<_>>>()?,
			Some(_) => {
				return Err(SinkError::InvalidParameter {
					name: "records",
					message: "expected an array, an object or null".to_string(),
				});
			}
		};

		Ok(Self {
			url,
			username,
			password,
			id_key,
			records,
		})
	}

	/// The id of `record` under `id_key`, as used in document paths.
	pub fn document_id(&self, record: &Document) -> Result<Value> {
		match record.get(&self.id_key) {
			None | Some(Value::Null) => Err(SinkError::InvalidParameter {
				name: "records",
				message: format!("record is missing id key {}", self.id_key),
			}),
			Some(id) => Ok(id.clone()),
		}
	}
}

fn required(params: &Map<String, Value>, name: &'static str) -> Result<String> {
	match params.get(name) {
		None | Some(Value::Null) => Err(SinkError::MissingParameter(name)),
		Some(Value::String(value)) if value.trim().is_empty() => Err(SinkError::MissingParameter(name)),
		Some(Value::String(value)) => Ok(value.clone()),
		Some(_) => Err(SinkError::InvalidParameter {
			name,
			message: "expected a string".to_string(),
		}),
	}
}
