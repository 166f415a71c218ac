// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! On-disk record framing.
//!
//! ```text
//! +-----------------+---------------------+-----------------+
//! | len: u32 LE     | xxh3_64(payload) LE | payload (len)   |
//! +-----------------+---------------------+-----------------+
//! ```

use std::{
	fs::File,
	io::{self, Read, Seek, SeekFrom},
};

use xxhash_rust::xxh3::xxh3_64;

pub(crate) const HEADER_LEN: u64 = 12;

pub(crate) fn encode(payload: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(HEADER_LEN as usize + payload.len());
	buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
	buf.extend_from_slice(&xxh3_64(payload).to_le_bytes());
	buf.extend_from_slice(payload);
	buf
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
	Complete(Vec<u8>),
	/// Not enough bytes yet; the writer may still be mid-append.
	Incomplete,
	/// Checksum mismatch. `len` is the encoded length of the damaged frame.
	Corrupt {
		len: u64,
	},
}

impl Frame {
	pub(crate) fn encoded_len(payload: &[u8]) -> u64 {
		HEADER_LEN + payload.len() as u64
	}
}

/// Reads the frame starting at `offset` without trusting the length prefix
/// beyond the current file size.
pub(crate) fn read_at(file: &mut File, offset: u64) -> io::Result<Frame> {
	let size = file.metadata()?.len();
	if offset + HEADER_LEN > size {
		return Ok(Frame::Incomplete);
	}

	file.seek(SeekFrom::Start(offset))?;
	let mut header = [0u8; HEADER_LEN as usize];
	if read_full(file, &mut header)? < header.len() {
		return Ok(Frame::Incomplete);
	}

	let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
	let checksum = u64::from_le_bytes([
		header[4], header[5], header[6], header[7], header[8], header[9], header[10], header[11],
	]);

	if offset + HEADER_LEN + len > size {
		return Ok(Frame::Incomplete);
	}

	let mut payload = vec![0u8; len as usize];
	if read_full(file, &mut payload)? < payload.len() {
		return Ok(Frame::Incomplete);
	}

	if xxh3_64(&payload) != checksum {
		return Ok(Frame::Corrupt {
			len: HEADER_LEN + len,
		});
	}
	Ok(Frame::Complete(payload))
}

fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
	let mut filled = 0;
	while filled < buf.len() {
		match file.read(&mut buf[filled..]) {
			Ok(0) => break,
			Ok(n) => filled += n,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
			Err(e) => return Err(e),
		}
	}
	Ok(filled)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use switchyard_testing::temp_dir;

	use super::*;

	#[test]
	fn test_read_complete_and_partial_frames() {
		temp_dir(|dir| {
			let path = dir.join("frames");
			let mut file = File::options().create(true).read(true).append(true).open(&path).unwrap();

			let first = encode(b"hello");
			file.write_all(&first).unwrap();
			let second = encode(b"world");
			file.write_all(&second[..7]).unwrap();

			assert_eq!(read_at(&mut file, 0).unwrap(), Frame::Complete(b"hello".to_vec()));
			assert_eq!(read_at(&mut file, first.len() as u64).unwrap(), Frame::Incomplete);

			file.write_all(&second[7..]).unwrap();
			assert_eq!(read_at(&mut file, first.len() as u64).unwrap(), Frame::Complete(b"world".to_vec()));
			Ok(())
		})
		.unwrap();
	}

	#[test]
	fn test_checksum_mismatch_is_corrupt() {
		temp_dir(|dir| {
			let path = dir.join("frames");
			let mut bytes = encode(b"payload");
			let last = bytes.len() - 1;
			bytes[last] ^= 0xff;
			std::fs::write(&path, &bytes).unwrap();

			let mut file = File::open(&path).unwrap();
			assert_eq!(
				read_at(&mut file, 0).unwrap(),
				Frame::Corrupt {
					len: HEADER_LEN + 7
				}
			);
			Ok(())
		})
		.unwrap();
	}
}
