// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Thread-level building blocks used across Switchyard:
//! - [`Timers`]: one-shot and repeating timers on a coordinator thread
//! - [`CancellationToken`]: cooperative shutdown flag
//! - [`Backoff`]: bounded exponential parking
//! - [`Clock`]: system or mock wall-clock time

pub mod backoff;
pub mod cancel;
pub mod clock;
pub mod timer;

pub use backoff::Backoff;
pub use cancel::CancellationToken;
pub use clock::Clock;
pub use timer::{TimerHandle, Timers};
