// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
	Mysql,
	Postgresql,
}

impl DbKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			DbKind::Mysql => "mysql",
			DbKind::Postgresql => "postgresql",
		}
	}
}

impl Display for DbKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DbKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"mysql" => Ok(DbKind::Mysql),
			"postgresql" | "postgres" => Ok(DbKind::Postgresql),
			other => Err(ConfigError::UnsupportedDatabase(other.to_string())),
		}
	}
}

/// Identifies one monitored database instance. Selects the source's event log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceIdentity {
	pub kind: DbKind,
	pub host: String,
	pub port: u16,
	pub username: String,
	pub password: String,
	pub server_id: Option<u32>,
}

impl SourceIdentity {
	/// Filesystem-safe directory name, stable for equal identities.
	///
	/// The credentials only contribute through the hash so they never
	/// appear on disk in clear text.
	pub fn dir_name(&self) -> String {
		let host: String = self
			.host
			.chars()
			.map(|c| {
				if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
					c
				} else {
					'_'
				}
			})
			.collect();
		format!("{}-{}-{}-{:016x}", self.kind, host, self.port, self.fingerprint())
	}

	pub fn fingerprint(&self) -> u64 {
		let key = format!(
			"{}:{}:{}@{}:{}#{}",
			self.kind,
			self.host,
			self.port,
			self.username,
			self.password,
			self.server_id.unwrap_or(0)
		);
		xxh3_64(key.as_bytes())
	}
}

impl Display for SourceIdentity {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}://{}@{}:{}", self.kind, self.username, self.host, self.port)?;
		if let Some(server_id) = self.server_id {
			write!(f, "#{}", server_id)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn identity(password: &str) -> SourceIdentity {
		SourceIdentity {
			kind: DbKind::Mysql,
			host: "db/primary:1".to_string(),
			port: 3306,
			username: "root".to_string(),
			password: password.to_string(),
			server_id: Some(1000),
		}
	}

	#[test]
	fn test_parse_kind() {
		assert_eq!("MySQL".parse::<DbKind>().unwrap(), DbKind::Mysql);
		assert_eq!("postgres".parse::<DbKind>().unwrap(), DbKind::Postgresql);
		assert_eq!(
			"oracle".parse::<DbKind>().unwrap_err(),
			ConfigError::UnsupportedDatabase("oracle".to_string())
		);
	}

	#[test]
	fn test_dir_name_is_sanitized_and_hides_password() {
		let name = identity("secret").dir_name();
		assert!(name.starts_with("mysql-db_primary_1-3306-"), "{name}");
		assert!(!name.contains("secret"));
	}

	#[test]
	fn test_dir_name_distinguishes_credentials() {
		assert_eq!(identity("a").dir_name(), identity("a").dir_name());
		assert_ne!(identity("a").dir_name(), identity("b").dir_name());
	}

	#[test]
	fn test_display_omits_password() {
		let shown = identity("secret").to_string();
		assert_eq!(shown, "mysql://root@db/primary:1:3306#1000");
	}
}
