// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Types shared by every Switchyard crate.

pub mod config;
pub mod error;
pub mod identity;
pub mod interest;
pub mod record;
pub mod script;

pub use config::{SourceConfig, SystemConfig};
pub use error::{ConfigError, ScriptError};
pub use identity::{DbKind, SourceIdentity};
pub use interest::Interest;
pub use record::{ChangeRecord, Op, Rejection};
pub use script::ScriptId;

pub type Result<T> = std::result::Result<T, ConfigError>;
