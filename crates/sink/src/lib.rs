// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

mod error;
mod http;
mod memory;
pub mod plan;
mod request;
mod sink;

pub use error::{Result, SinkError};
pub use http::HttpSink;
pub use memory::MemorySink;
pub use request::{Document, SinkAction, SinkRequest};
pub use sink::Sink;
