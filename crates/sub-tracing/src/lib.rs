// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

mod builder;
mod error;
mod factory;

pub use builder::{DEFAULT_LOG_FILE, TracingBuilder};
pub use error::TracingError;
pub use factory::{TracingConfigurator, TracingFactory};
