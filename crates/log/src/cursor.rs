// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::Mutex;
use switchyard_core::ScriptId;

use crate::{
	LogEntry, LogError, Position, Result,
	frame::{self, Frame},
	log::Shared,
	segment,
};

const EXTENSION: &str = "cur";

pub(crate) struct CursorState {
	script: ScriptId,
	position: Position,
	committed: Position,
	file: Option<(u64, File)>,
}

impl CursorState {
	pub(crate) fn new(script: ScriptId, position: Position) -> Self {
		Self {
			script,
			position,
			committed: position,
			file: None,
		}
	}

	fn seek(&mut self, segment: u64) {
		self.position = Position::new(segment, 0);
		self.file = None;
	}

	fn segment_file(&mut self, dir: &Path) -> Result<Option<&mut File>> {
		let segment = self.position.segment;
		let stale = !matches!(&self.file, Some((open, _)) if *open == segment);
		if stale {
			let path = segment::segment_path(dir, segment);
			match File::open(&path) {
				Ok(file) => self.file = Some((segment, file)),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
					self.file = None;
					return Ok(None);
				}
				Err(e) => return Err(LogError::io(path)(e)),
			}
		}
		Ok(self.file.as_mut().map(|(_, file)| file))
	}
}

/// A named read position over one event log.
///
/// Handles returned by [`EventLog::open_cursor`](crate::EventLog::open_cursor)
/// for the same script share one logical cursor.
#[derive(Clone)]
pub struct Cursor {
	shared: Arc<Shared>,
	state: Arc<Mutex<CursorState>>,
}

impl Cursor {
	pub(crate) fn new(shared: Arc<Shared>, state: Arc<Mutex<CursorState>>) -> Self {
		Self {
			shared,
			state,
		}
	}

	pub fn script(&self) -> ScriptId {
		self.state.lock().script.clone()
	}

	/// In-memory position, ahead of the committed one while a record is in flight.
	pub fn position(&self) -> Position {
		self.state.lock().position
	}

	pub fn committed(&self) -> Position {
		self.state.lock().committed
	}

	/// Returns the next complete record, or `None` if there is none yet.
	///
	/// A frame failing its checksum is reported once as [`LogError::Corrupt`]
	/// and stepped over, so the following read continues behind it.
	pub fn read_next(&self) -> Result<Option<LogEntry>> {
		let dir = self.shared.dir.as_path();
		let mut state = self.state.lock();
		let mut rechecked = false;

		loop {
			let position = state.position;
			let Some(file) = state.segment_file(dir)? else {
				match segment::next_segment(dir, position.segment)? {
					Some(next) => {
						state.seek(next);
						rechecked = false;
						continue;
					}
					None => return Ok(None),
				}
			};

			let path = || segment::segment_path(dir, position.segment);
			match frame::read_at(file, position.offset).map_err(|e| LogError::io(path())(e))? {
				Frame::Complete(payload) => {
					let next = Position::new(position.segment, position.offset + Frame::encoded_len(&payload));
					state.position = next;
					return Ok(Some(LogEntry {
						position,
						next,
						payload,
					}));
				}
				Frame::Corrupt {
					len,
				} => {
					state.position = Position::new(position.segment, position.offset + len);
					return Err(LogError::Corrupt {
						position,
					});
				}
				Frame::Incomplete => {
					if self.shared.active_segment() <= position.segment {
						return Ok(None);
					}
					// the writer has rolled; a last append may have landed before it did
					if !rechecked {
						rechecked = true;
						continue;
					}
					match segment::next_segment(dir, position.segment)? {
						Some(next) => {
							state.seek(next);
							rechecked = false;
						}
						None => return Ok(None),
					}
				}
			}
		}
	}

	/// Persists the in-memory position. Records before it are acknowledged.
	pub fn commit(&self) -> Result<()> {
		let mut state = self.state.lock();
		if state.committed == state.position {
			return Ok(());
		}
		persist(&self.shared.cursor_dir, &state.script, state.position, self.shared.config.sync)?;
		state.committed = state.position;
		Ok(())
	}
}

impl std::fmt::Debug for Cursor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("Cursor")
			.field("script", &state.script)
			.field("position", &state.position)
			.field("committed", &state.committed)
			.finish()
	}
}

pub(crate) fn cursor_path(dir: &Path, script: &ScriptId) -> PathBuf {
	let name: String = script
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
				c
			} else {
				'_'
			}
		})
		.collect();
	dir.join(format!("{}.{}", name, EXTENSION))
}

pub(crate) fn load(dir: &Path, script: &ScriptId) -> Result<Option<Position>> {
	let path = cursor_path(dir, script);
	match fs::read(&path) {
		Ok(bytes) => decode(&path, &bytes).map(Some),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(LogError::io(path)(e)),
	}
}

/// Writes the position atomically: temp file, then rename over the old one.
pub(crate) fn persist(dir: &Path, script: &ScriptId, position: Position, sync: bool) -> Result<()> {
	let path = cursor_path(dir, script);
	let tmp = path.with_extension("tmp");
	let bytes = postcard::to_stdvec(&position).map_err(|e| LogError::Codec(e.to_string()))?;

	let mut file = File::create(&tmp).map_err(LogError::io(&tmp))?;
	file.write_all(&bytes).map_err(LogError::io(&tmp))?;
	if sync {
		file.sync_all().map_err(LogError::io(&tmp))?;
	}
	drop(file);

	fs::rename(&tmp, &path).map_err(LogError::io(&path))
}

/// Committed positions of every persisted cursor in `dir`.
pub(crate) fn load_all(dir: &Path) -> Result<Vec<Position>> {
	let mut positions = Vec::new();
	for entry in fs::read_dir(dir).map_err(LogError::io(dir))? {
		let path = entry.map_err(LogError::io(dir))?.path();
		if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
			continue;
		}
		let bytes = fs::read(&path).map_err(LogError::io(&path))?;
		positions.push(decode(&path, &bytes)?);
	}
	Ok(positions)
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Position> {
	postcard::from_bytes(bytes).map_err(|e| LogError::Codec(format!("{}: {}", path.display(), e)))
}
