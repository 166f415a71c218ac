// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Runs script work on a fixed worker pool.
//!
//! Serial scripts hold a per-script gate from dispatch until their work
//! finishes, so a caller scheduling the next record blocks until the previous
//! one is done. Parallel scripts skip the gate.

mod completion;
mod config;
mod error;
mod gate;
mod scheduler;

pub use completion::Completion;
pub use config::SchedulerConfig;
pub use error::{Result, SchedulerError};
pub use scheduler::ScriptScheduler;
