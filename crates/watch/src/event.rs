// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::PathBuf;

use notify::{
	EventKind,
	event::{ModifyKind, RenameMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
	Create,
	Modify,
	Delete,
}

impl WatchKind {
	pub const ALL: [WatchKind; 3] = [WatchKind::Create, WatchKind::Modify, WatchKind::Delete];

	/// Maps a raw notification. Access and unknown events map to nothing.
	pub(crate) fn from_notify(kind: &EventKind) -> Option<Self> {
		match kind {
			EventKind::Create(_) => Some(WatchKind::Create),
			EventKind::Remove(_) => Some(WatchKind::Delete),
			EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchKind::Delete),
			EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(WatchKind::Create),
			EventKind::Modify(_) => Some(WatchKind::Modify),
			EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
		}
	}
}

/// A debounced change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
	pub path: PathBuf,
	pub kind: WatchKind,
}

#[cfg(test)]
mod tests {
	use notify::event::{CreateKind, DataChange, RemoveKind};

	use super::*;

	#[test]
	fn test_from_notify() {
		assert_eq!(WatchKind::from_notify(&EventKind::Create(CreateKind::File)), Some(WatchKind::Create));
		assert_eq!(
			WatchKind::from_notify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
			Some(WatchKind::Modify)
		);
		assert_eq!(WatchKind::from_notify(&EventKind::Remove(RemoveKind::Folder)), Some(WatchKind::Delete));
		assert_eq!(
			WatchKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
			Some(WatchKind::Delete)
		);
		assert_eq!(WatchKind::from_notify(&EventKind::Any), None);
	}
}
