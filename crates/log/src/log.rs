// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::Duration,
};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use switchyard_core::ScriptId;
use tracing::{debug, info, instrument};

use crate::{
	Cursor, EventLogConfig, LogError, Position, Result,
	cursor::{self, CursorState},
	frame, segment,
};

struct Writer {
	file: File,
	segment: u64,
	len: u64,
}

/// Wakes parked readers after each append.
struct AppendSignal {
	generation: Mutex<u64>,
	condvar: Condvar,
}

impl AppendSignal {
	fn notify(&self) {
		let mut generation = self.generation.lock();
		*generation = generation.wrapping_add(1);
		self.condvar.notify_all();
	}

	fn current(&self) -> u64 {
		*self.generation.lock()
	}

	fn wait(&self, seen: u64, timeout: Duration) -> u64 {
		let mut generation = self.generation.lock();
		if *generation == seen {
			let _ = self.condvar.wait_for(&mut generation, timeout);
		}
		*generation
	}
}

pub(crate) struct Shared {
	pub(crate) dir: PathBuf,
	pub(crate) cursor_dir: PathBuf,
	pub(crate) config: EventLogConfig,
	active: AtomicU64,
	writer: Mutex<Option<Writer>>,
	signal: AppendSignal,
	cursors: DashMap<ScriptId, Arc<Mutex<CursorState>>>,
}

impl Shared {
	/// Newest segment the writer has opened. Older segments are final.
	pub(crate) fn active_segment(&self) -> u64 {
		self.active.load(Ordering::SeqCst)
	}
}

/// Append-only, time-segmented record log of one source.
///
/// ```text
/// <dir>/
///   00000000000000480000.seg
///   00000000000000480001.seg
///   cursors/<script>.cur
/// ```
#[derive(Clone)]
pub struct EventLog {
	shared: Arc<Shared>,
}

impl EventLog {
	/// Opens or creates the log, truncating a torn tail of the newest segment.
	#[instrument(name = "log::open", level = "debug", skip(config), fields(dir = %dir.as_ref().display()))]
	pub fn open(dir: impl AsRef<Path>, config: EventLogConfig) -> Result<Self> {
		let dir = dir.as_ref().to_path_buf();
		let cursor_dir = dir.join("cursors");
		fs::create_dir_all(&cursor_dir).map_err(LogError::io(&cursor_dir))?;

		let mut writer = None;
		if let Some(&newest) = segment::list_segments(&dir)?.last() {
			let len = segment::recover(&dir, newest)?;
			let path = segment::segment_path(&dir, newest);
			let file = File::options().append(true).open(&path).map_err(LogError::io(&path))?;
			debug!(segment = newest, len = len, "resuming event log segment");
			writer = Some(Writer {
				file,
				segment: newest,
				len,
			});
		}
		let active = writer.as_ref().map(|w| w.segment).unwrap_or(0);

		Ok(Self {
			shared: Arc::new(Shared {
				dir,
				cursor_dir,
				config,
				active: AtomicU64::new(active),
				writer: Mutex::new(writer),
				signal: AppendSignal {
					generation: Mutex::new(0),
					condvar: Condvar::new(),
				},
				cursors: DashMap::new(),
			}),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.shared.dir
	}

	/// Appends one record and wakes readers. Returns the record's position.
	pub fn append(&self, payload: &[u8]) -> Result<Position> {
		let shared = &self.shared;
		let mut guard = shared.writer.lock();

		let now = shared.config.segment_for_now();
		let writer = match guard.take() {
			Some(writer) if now <= writer.segment => guard.insert(writer),
			previous => {
				let path = segment::segment_path(&shared.dir, now);
				let file =
					File::options().create(true).append(true).open(&path).map_err(LogError::io(&path))?;
				let len = file.metadata().map_err(LogError::io(&path))?.len();
				if let Some(previous) = previous {
					info!(from = previous.segment, to = now, "rolling event log segment");
				}
				shared.active.store(now, Ordering::SeqCst);
				guard.insert(Writer {
					file,
					segment: now,
					len,
				})
			}
		};

		let bytes = frame::encode(payload);
		let position = Position::new(writer.segment, writer.len);
		let path = || segment::segment_path(&shared.dir, position.segment);

		if let Err(e) = writer.file.write_all(&bytes).and_then(|_| writer.file.flush()) {
			// drop the partial frame so the next append starts on a boundary
			let _ = writer.file.set_len(position.offset);
			return Err(LogError::io(path())(e));
		}
		if shared.config.sync {
			writer.file.sync_data().map_err(|e| LogError::io(path())(e))?;
		}
		writer.len += bytes.len() as u64;
		drop(guard);

		shared.signal.notify();
		Ok(position)
	}

	/// Returns the cursor named after `script`, resuming from its persisted
	/// position or, for a new cursor, from the oldest segment.
	pub fn open_cursor(&self, script: &ScriptId) -> Result<Cursor> {
		if let Some(state) = self.shared.cursors.get(script) {
			return Ok(Cursor::new(self.shared.clone(), state.value().clone()));
		}

		let position = match cursor::load(&self.shared.cursor_dir, script)? {
			Some(position) => position,
			None => {
				let start = segment::list_segments(&self.shared.dir)?.first().copied().unwrap_or(0);
				let position = Position::new(start, 0);
				cursor::persist(&self.shared.cursor_dir, script, position, self.shared.config.sync)?;
				position
			}
		};

		let state = self
			.shared
			.cursors
			.entry(script.clone())
			.or_insert_with(|| Arc::new(Mutex::new(CursorState::new(script.clone(), position))))
			.value()
			.clone();
		debug!(script = %script, segment = position.segment, offset = position.offset, "cursor opened");
		Ok(Cursor::new(self.shared.clone(), state))
	}

	/// Forgets the in-memory cursor. Its persisted position is kept.
	pub fn close_cursor(&self, script: &ScriptId) {
		self.shared.cursors.remove(script);
	}

	/// Current append generation, to pass to [`wait_for_append`](Self::wait_for_append).
	pub fn append_generation(&self) -> u64 {
		self.shared.signal.current()
	}

	/// Parks until an append happens after `seen` or the timeout elapses.
	pub fn wait_for_append(&self, seen: u64, timeout: Duration) -> u64 {
		self.shared.signal.wait(seen, timeout)
	}

	/// Lowest segment still needed by any persisted cursor.
	pub fn watermark(&self) -> Result<Option<u64>> {
		Ok(cursor::load_all(&self.shared.cursor_dir)?.into_iter().map(|p| p.segment).min())
	}

	/// Deletes segments every cursor has moved past. Returns how many were removed.
	pub fn prune(&self) -> Result<usize> {
		let Some(watermark) = self.watermark()? else {
			return Ok(0);
		};
		let active = self.shared.active_segment();

		let mut removed = 0;
		for segment in segment::list_segments(&self.shared.dir)? {
			if segment >= watermark || segment == active {
				continue;
			}
			let path = segment::segment_path(&self.shared.dir, segment);
			fs::remove_file(&path).map_err(LogError::io(&path))?;
			removed += 1;
		}
		if removed > 0 {
			info!(removed = removed, watermark = watermark, "pruned event log segments");
		}
		Ok(removed)
	}

	pub fn segments(&self) -> Result<Vec<u64>> {
		segment::list_segments(&self.shared.dir)
	}
}

impl std::fmt::Debug for EventLog {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventLog").field("dir", &self.shared.dir).finish()
	}
}
