// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Durable per-source event log.
//!
//! Records are appended by a single writer into time-rolled segment files and
//! read back by any number of named cursors, each advancing and persisting
//! its own position independently.

mod config;
mod cursor;
mod entry;
mod error;
mod frame;
mod log;
mod registry;
mod segment;

pub use config::{DEFAULT_ROLL_INTERVAL, EventLogConfig};
pub use cursor::Cursor;
pub use entry::{LogEntry, Position};
pub use error::{LogError, Result};
pub use log::EventLog;
pub use registry::LogRegistry;
