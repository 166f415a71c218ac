// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{io, path::PathBuf};

use crate::Position;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
	#[error("I/O error on {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("corrupt record at segment {} offset {}", position.segment, position.offset)]
	Corrupt {
		position: Position,
	},

	#[error("cursor codec error: {0}")]
	Codec(String),
}

impl LogError {
	pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> LogError {
		let path = path.into();
		move |source| LogError::Io {
			path,
			source,
		}
	}
}

pub type Result<T> = std::result::Result<T, LogError>;
