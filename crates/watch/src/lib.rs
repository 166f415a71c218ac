// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Debounced filesystem watching.
//!
//! One `notify` watcher feeds a listener thread. Every affected path is
//! debounced on its own timer before the event reaches the handlers
//! registered for that path or one of its ancestors.

mod config;
mod debounce;
mod error;
mod event;
mod watcher;

pub use config::{DEFAULT_QUIET_PERIOD, WatcherConfig};
pub use debounce::Debouncer;
pub use error::{Result, WatchError};
pub use event::{WatchEvent, WatchKind};
pub use watcher::{Subscription, Watcher};
