// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::{self, File},
	path::{Path, PathBuf},
};

use tracing::warn;

use crate::{
	LogError, Result,
	frame::{self, Frame},
};

const EXTENSION: &str = "seg";

pub(crate) fn segment_path(dir: &Path, segment: u64) -> PathBuf {
	dir.join(format!("{:020}.{}", segment, EXTENSION))
}

fn parse_segment(path: &Path) -> Option<u64> {
	if path.extension()?.to_str()? != EXTENSION {
		return None;
	}
	path.file_stem()?.to_str()?.parse().ok()
}

/// Segment ids present in `dir`, ascending.
pub(crate) fn list_segments(dir: &Path) -> Result<Vec<u64>> {
	let mut segments = Vec::new();
	for entry in fs::read_dir(dir).map_err(LogError::io(dir))? {
		let entry = entry.map_err(LogError::io(dir))?;
		if let Some(segment) = parse_segment(&entry.path()) {
			segments.push(segment);
		}
	}
	segments.sort_unstable();
	Ok(segments)
}

/// Smallest segment strictly greater than `segment`.
pub(crate) fn next_segment(dir: &Path, segment: u64) -> Result<Option<u64>> {
	Ok(list_segments(dir)?.into_iter().find(|s| *s > segment))
}

/// Truncates the segment to its last valid frame and returns the resulting length.
pub(crate) fn recover(dir: &Path, segment: u64) -> Result<u64> {
	let path = segment_path(dir, segment);
	let mut file = File::options().read(true).write(true).open(&path).map_err(LogError::io(&path))?;
	let size = file.metadata().map_err(LogError::io(&path))?.len();

	let mut valid = 0u64;
	loop {
		match frame::read_at(&mut file, valid).map_err(LogError::io(&path))? {
			Frame::Complete(payload) => valid += Frame::encoded_len(&payload),
			Frame::Incomplete | Frame::Corrupt { .. } => break,
		}
	}

	if valid < size {
		warn!(segment = segment, valid = valid, size = size, "truncating torn segment tail");
		file.set_len(valid).map_err(LogError::io(&path))?;
		file.sync_all().map_err(LogError::io(&path))?;
	}
	Ok(valid)
}
