// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
	#[error("scheduler is closed")]
	Closed,

	#[error("failed to build worker pool: {0}")]
	Pool(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
