// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	ops::Deref,
};

use serde::{Deserialize, Serialize};

/// Name of a script. Also names the script's cursors.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScriptId(String);

impl ScriptId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for ScriptId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl Deref for ScriptId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<&str> for ScriptId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for ScriptId {
	fn from(value: String) -> Self {
		Self(value)
	}
}
