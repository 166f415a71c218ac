// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	sync::Arc,
};

use serde_json::{Map, Value};

/// Row-level operation of a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
	Create,
	Update,
	Delete,
	Read,
}

impl Op {
	pub fn from_code(code: &str) -> Option<Op> {
		match code {
			"c" => Some(Op::Create),
			"u" => Some(Op::Update),
			"d" => Some(Op::Delete),
			"r" => Some(Op::Read),
			_ => None,
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			Op::Create => "c",
			Op::Update => "u",
			Op::Delete => "d",
			Op::Read => "r",
		}
	}
}

/// Why a raw connector value does not become a [`ChangeRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
	Malformed(String),
	MissingPayload,
	Ddl,
	UnsupportedOp(Option<String>),
	MissingAfter,
}

impl Display for Rejection {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Rejection::Malformed(msg) => write!(f, "malformed change record: {}", msg),
			Rejection::MissingPayload => f.write_str("no payload body"),
			Rejection::Ddl => f.write_str("schema change"),
			Rejection::UnsupportedOp(Some(op)) => write!(f, "unsupported op {}", op),
			Rejection::UnsupportedOp(None) => f.write_str("missing op"),
			Rejection::MissingAfter => f.write_str("no after image"),
		}
	}
}

/// One row mutation, kept as the verbatim JSON text it arrived as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
	text: Arc<str>,
	op: Op,
	db: Option<String>,
	table: Option<String>,
}

impl ChangeRecord {
	/// Parses the envelope of a raw change event.
	///
	/// Only row changes (`c`, `u`, `d`, `r`) whose payload carries an
	/// `after` key are accepted. A present `null` after image is accepted.
	pub fn parse(text: impl Into<Arc<str>>) -> Result<Self, Rejection> {
		let text = text.into();
		let root: Value = serde_json::from_str(&text).map_err(|e| Rejection::Malformed(e.to_string()))?;

		let payload = match root.get("payload") {
			Some(Value::Object(payload)) => payload,
			_ => return Err(Rejection::MissingPayload),
		};

		if payload.contains_key("ddl") {
			return Err(Rejection::Ddl);
		}

		let op = match payload.get("op") {
			Some(Value::String(code)) => {
				Op::from_code(code).ok_or_else(|| Rejection::UnsupportedOp(Some(code.clone())))?
			}
			_ => return Err(Rejection::UnsupportedOp(None)),
		};

		if !payload.contains_key("after") {
			return Err(Rejection::MissingAfter);
		}

		let (db, table) = source_location(payload);

		Ok(Self {
			text,
			op,
			db,
			table,
		})
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn shared_text(&self) -> Arc<str> {
		self.text.clone()
	}

	pub fn as_bytes(&self) -> &[u8] {
		self.text.as_bytes()
	}

	pub fn op(&self) -> Op {
		self.op
	}

	pub fn db(&self) -> Option<&str> {
		self.db.as_deref()
	}

	pub fn table(&self) -> Option<&str> {
		self.table.as_deref()
	}
}

fn source_location(payload: &Map<String, Value>) -> (Option<String>, Option<String>) {
	let Some(Value::Object(source)) = payload.get("source") else {
		return (None, None);
	};
	let field = |name: &str| source.get(name).and_then(Value::as_str).map(str::to_string);
	(field("db"), field("table"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_create() {
		let text = r#"{"payload":{"op":"c","after":{"id":1},"source":{"db":"shop","table":"orders"}}}"#;
		let record = ChangeRecord::parse(text).unwrap();
		assert_eq!(record.op(), Op::Create);
		assert_eq!(record.db(), Some("shop"));
		assert_eq!(record.table(), Some("orders"));
		assert_eq!(record.text(), text);
	}

	#[test]
	fn test_parse_null_after_is_kept() {
		let record = ChangeRecord::parse(r#"{"payload":{"op":"d","before":{"id":1},"after":null}}"#).unwrap();
		assert_eq!(record.op(), Op::Delete);
		assert_eq!(record.db(), None);
	}

	#[test]
	fn test_parse_rejections() {
		assert_eq!(ChangeRecord::parse(r#"{"schema":{}}"#).unwrap_err(), Rejection::MissingPayload);
		assert_eq!(
			ChangeRecord::parse(r#"{"payload":{"ddl":"CREATE TABLE t (id INT)","op":"c","after":{}}}"#)
				.unwrap_err(),
			Rejection::Ddl
		);
		assert_eq!(
			ChangeRecord::parse(r#"{"payload":{"op":"t","after":{}}}"#).unwrap_err(),
			Rejection::UnsupportedOp(Some("t".to_string()))
		);
		assert_eq!(
			ChangeRecord::parse(r#"{"payload":{"op":"d","before":{"id":1}}}"#).unwrap_err(),
			Rejection::MissingAfter
		);
		assert!(matches!(ChangeRecord::parse("{not json").unwrap_err(), Rejection::Malformed(_)));
	}
}
