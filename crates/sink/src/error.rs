// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
	#[error("parameter {0} is required")]
	MissingParameter(&'static str),

	#[error("parameter {name} is invalid: {message}")]
	InvalidParameter {
		name: &'static str,
		message: String,
	},

	#[error("request failed: {0}")]
	Transport(String),

	#[error("request failed with status {status}: {body}")]
	Status {
		status: u16,
		body: String,
	},
}

pub type Result<T> = std::result::Result<T, SinkError>;
