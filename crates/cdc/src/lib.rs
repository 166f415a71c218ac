// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Change pipeline.
//!
//! Raw change events from a connector pass the [`Normalizer`], are appended
//! to their source's event log by a [`RecordHandler`], and are tailed by one
//! [`ScriptReader`] per (source, script) which schedules the script and
//! commits its cursor once the execution has settled.

mod connector;
mod error;
mod handler;
mod manager;
mod normalize;
mod pipeline;
mod reader;

pub use connector::{Connector, ConnectorFactory, ConnectorProperties};
pub use error::{CdcError, Result};
pub use handler::RecordHandler;
pub use manager::ConnectorManager;
pub use normalize::Normalizer;
pub use pipeline::{Pipeline, PipelineConfig};
pub use reader::{ReaderConfig, ScriptReader};
