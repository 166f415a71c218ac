// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::{BTreeMap, btree_map},
	path::Path,
};

use switchyard_core::{ConfigError, DbKind, SourceConfig};
use switchyard_runtime::CancellationToken;

use crate::Result;

/// Change capture client for one source.
///
/// `run` blocks until `cancel` fires or the connector fails, handing every
/// raw change event to `emit` as it arrives. `None` is a tombstone. The
/// connector keeps its own resume checkpoint in the offset file named by its
/// properties.
pub trait Connector: Send + 'static {
	fn run(&mut self, emit: &mut dyn FnMut(Option<&str>), cancel: &CancellationToken) -> Result<()>;
}

/// Builds connectors from their property set.
pub trait ConnectorFactory: Send + Sync + 'static {
	fn create(&self, properties: &ConnectorProperties) -> Result<Box<dyn Connector>>;
}

/// Flat key/value configuration handed to a connector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorProperties {
	properties: BTreeMap<String, String>,
}

impl ConnectorProperties {
	/// Derives the properties for `source`, keeping checkpoints under `offset_dir`.
	pub fn for_source(source: &SourceConfig, offset_dir: &Path) -> std::result::Result<Self, ConfigError> {
		source.validate()?;

		let kind = source.kind.as_str();
		let name = format!("{}-{}", kind, source.name);
		let offset_file = |file: String| offset_dir.join(file).to_string_lossy().into_owned();

		let mut props = Self::default();
		props.set("name", &name);
		props.set("topic.prefix", format!("{}_{}", kind, source.name));
		props.set("offset.storage", "org.apache.kafka.connect.storage.FileOffsetBackingStore");
		props.set("offset.storage.file.filename", offset_file(format!("{}_offset.dat", name)));

		props.set("database.hostname", &source.host);
		props.set("database.port", source.port.to_string());
		props.set("database.user", &source.username);
		props.set("database.password", &source.password);
		props.set("schemas.enable", "false");

		if !source.tables.is_empty() {
			props.set("table.include.list", join(&source.tables));
		}

		match source.kind {
			DbKind::Mysql => {
				props.set("connector.class", "io.debezium.connector.mysql.MySqlConnector");
				// validate() guarantees a server id
				props.set("database.server.id", source.server_id.unwrap_or_default().to_string());
				if !source.databases.is_empty() {
					props.set("database.include.list", join(&source.databases));
				}
				props.set("schema.history.internal", "io.debezium.storage.file.history.FileSchemaHistory");
				props.set(
					"schema.history.internal.file.filename",
					offset_file(format!("mysql-{}_dbhistory.dat", source.name)),
				);
			}
			DbKind::Postgresql => {
				props.set("connector.class", "io.debezium.connector.postgresql.PostgresConnector");
				if let Some(database) = source.databases.iter().next() {
					props.set("database.dbname", database);
				}
				props.set("plugin.name", "pgoutput");
				props.set("slot.name", format!("debezium_{}", source.name));
				props.set("publication.name", format!("debezium_{}", source.name));
				props.set("database.history", "io.debezium.relational.history.FileDatabaseHistory");
				props.set(
					"database.history.file.filename",
					offset_file(format!("pg-{}_dbhistory.dat", source.name)),
				);
			}
		}
		Ok(props)
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.properties.insert(key.into(), value.into());
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.properties.get(key).map(String::as_str)
	}

	pub fn name(&self) -> &str {
		self.get("name").unwrap_or_default()
	}

	pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
		self.properties.iter()
	}

	pub fn len(&self) -> usize {
		self.properties.len()
	}

	pub fn is_empty(&self) -> bool {
		self.properties.is_empty()
	}
}

fn join(values: &std::collections::BTreeSet<String>) -> String {
	values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
