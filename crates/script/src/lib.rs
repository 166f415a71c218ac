// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Script runtime.
//!
//! A JavaScript script is an ES module whose default export is an async
//! function taking the change record text, with an optional `initCDC`
//! export. It reaches the search engine through the `es` global.
//!
//! A WebAssembly script is a module exporting `memory`, `alloc(len) -> ptr`,
//! `handle(ptr, len) -> status` and optionally `init_cdc()`. It talks to the
//! host through the `host`, `cdc` and `sink` import modules.

mod calls;
mod config;
mod context;
mod host;
mod init;
mod js;
mod kind;
mod registry;
mod runtime;

pub use config::RuntimeConfig;
pub use kind::{ScriptCode, ScriptKind};
pub use registry::{ScriptDescriptor, ScriptRegistry};
pub use runtime::ScriptRuntime;
pub use switchyard_core::ScriptError;
