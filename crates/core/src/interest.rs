// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::SourceConfig;

/// Databases and tables a script declared during `init_cdc`.
///
/// Empty sets match everything. A table entry matches either the bare
/// table name or the qualified `db.table` form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
	pub databases: BTreeSet<String>,
	pub tables: BTreeSet<String>,
}

impl Interest {
	pub fn everything() -> Self {
		Self::default()
	}

	pub fn is_everything(&self) -> bool {
		self.databases.is_empty() && self.tables.is_empty()
	}

	pub fn with_database(mut self, database: impl Into<String>) -> Self {
		self.databases.insert(database.into());
		self
	}

	pub fn with_table(mut self, table: impl Into<String>) -> Self {
		self.tables.insert(table.into());
		self
	}

	/// Whether a script with this interest should read the source's log.
	pub fn matches_source(&self, source: &SourceConfig) -> bool {
		if self.databases.is_empty() || source.databases.is_empty() {
			return true;
		}
		self.databases.iter().any(|db| source.databases.contains(db))
	}

	/// Whether a record from `db`.`table` should reach the script.
	pub fn matches(&self, db: Option<&str>, table: Option<&str>) -> bool {
		if !self.databases.is_empty() {
			match db {
				Some(db) if self.databases.contains(db) => {}
				_ => return false,
			}
		}

		if self.tables.is_empty() {
			return true;
		}

		match (db, table) {
			(_, None) => false,
			(None, Some(table)) => self.tables.contains(table),
			(Some(db), Some(table)) => {
				self.tables.contains(table) || self.tables.contains(&format!("{}.{}", db, table))
			}
		}
	}
}
