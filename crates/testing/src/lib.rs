// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

pub mod script;
pub mod tempdir;
pub mod util;

pub use tempdir::temp_dir;
pub use util::wait::{wait_for, wait_for_condition};
