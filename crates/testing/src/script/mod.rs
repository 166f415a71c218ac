// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! WebAssembly text scripts used across the test suites. JavaScript
//! counterparts live in [`js`].
//!
//! Every script exports `memory`, a bump allocator `alloc` and `handle`. The
//! allocator is reset when `handle` returns, so each invocation starts with
//! the same memory layout:
//!
//! ```text
//! 0      .. 1024    request prefix / constant parameters
//! 1024   .. 4096    needles and messages
//! 65536  ..         input record, then the outgoing request
//! ```

pub mod js;

use std::{fs, io, path::Path};

const HEAP_BASE: u32 = 65536;
const NEEDLE: u32 = 1024;
const MSG_NO_AFTER: u32 = 1040;
const MSG_NO_AFTER_TEXT: &str = "record has no after object";
const MSG: u32 = 1100;
const INTEREST: u32 = 2048;

/// Escapes `text` for a WAT string literal.
pub fn wat_string(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	for byte in text.bytes() {
		match byte {
			b'"' => out.push_str("\\\""),
			b'\\' => out.push_str("\\\\"),
			0x20..=0x7e => out.push(byte as char),
			other => out.push_str(&format!("\\{:02x}", other)),
		}
	}
	out
}

fn params_prefix(url: &str) -> String {
	format!(r#"{{"url":"{}","username":"elastic","password":"changeme","idKey":"id","records":"#, url)
}

/// `init_cdc` declaring the given databases and tables.
fn init_cdc(databases: &[&str], tables: &[&str]) -> (String, String) {
	let mut data = String::new();
	let mut body = String::new();
	let mut offset = INTEREST;
	for (import, names) in [("$database", databases), ("$table", tables)] {
		for name in names {
			data.push_str(&format!("  (data (i32.const {}) \"{}\")\n", offset, wat_string(name)));
			body.push_str(&format!("    (call {} (i32.const {}) (i32.const {}))\n", import, offset, name.len()));
			offset += name.len() as u32 + 1;
		}
	}
	let func = format!("  (func (export \"init_cdc\")\n{}  )\n", body);
	(data, func)
}

const ALLOC: &str = r#"
  (global $heap (mut i32) (i32.const 65536))
  (func (export "alloc") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $len)))
    (local.get $ptr))
"#;

const IMPORTS: &str = r#"
  (import "host" "log" (func $log (param i32 i32)))
  (import "host" "error" (func $error (param i32 i32)))
  (import "cdc" "database" (func $database (param i32 i32)))
  (import "cdc" "table" (func $table (param i32 i32)))
  (import "sink" "put" (func $put (param i32 i32) (result i32)))
  (import "sink" "delete" (func $delete (param i32 i32) (result i32)))
  (import "sink" "await" (func $await (param i32) (result i32)))
"#;

/// Forwards the record's `after` image to `sink.put` as the single record of
/// the request and waits for the response.
///
/// The optional interest is declared in `init_cdc`.
pub fn put_after(url: &str, databases: &[&str], tables: &[&str]) -> String {
	let prefix = params_prefix(url);
	let (interest_data, init) = init_cdc(databases, tables);
	format!(
		r#"(module
{imports}
  (memory (export "memory") 4)
  (data (i32.const 0) "{prefix}")
  (data (i32.const {needle}) "\"after\":")
  (data (i32.const {msg}) "{msg_text}")
{interest_data}{alloc}
{init}
  (func $fail (param $msg i32) (param $len i32) (result i32)
    (call $error (local.get $msg) (local.get $len))
    (global.set $heap (i32.const {heap}))
    (i32.const 1))

  (func $find (param $ptr i32) (param $len i32) (result i32)
    (local $i i32)
    (local $k i32)
    (block $not_found
      (loop $scan
        (br_if $not_found (i32.gt_u (i32.add (local.get $i) (i32.const 8)) (local.get $len)))
        (local.set $k (i32.const 0))
        (block $mismatch
          (loop $cmp
            (br_if $mismatch
              (i32.ne
                (i32.load8_u (i32.add (i32.add (local.get $ptr) (local.get $i)) (local.get $k)))
                (i32.load8_u (i32.add (i32.const {needle}) (local.get $k)))))
            (local.set $k (i32.add (local.get $k) (i32.const 1)))
            (br_if $cmp (i32.lt_u (local.get $k) (i32.const 8))))
          (return (i32.add (local.get $i) (i32.const 8))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $scan)))
    (i32.const -1))

  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (local $i i32)
    (local $c i32)
    (local $out i32)
    (local $o i32)
    (local $depth i32)
    (local $in_str i32)
    (local $esc i32)
    (local $pending i32)

    (local.set $i (call $find (local.get $ptr) (local.get $len)))
    (if (i32.lt_s (local.get $i) (i32.const 0))
      (then (return (call $fail (i32.const {msg}) (i32.const {msg_len})))))

    (block $start
      (loop $ws
        (br_if $start (i32.ge_u (local.get $i) (local.get $len)))
        (br_if $start (i32.ne (i32.load8_u (i32.add (local.get $ptr) (local.get $i))) (i32.const 32)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $ws)))
    (if (i32.ge_u (local.get $i) (local.get $len))
      (then (return (call $fail (i32.const {msg}) (i32.const {msg_len})))))
    (if (i32.ne (i32.load8_u (i32.add (local.get $ptr) (local.get $i))) (i32.const 123))
      (then (return (call $fail (i32.const {msg}) (i32.const {msg_len})))))

    (local.set $out (global.get $heap))
    (memory.copy (local.get $out) (i32.const 0) (i32.const {prefix_len}))
    (local.set $o (i32.add (local.get $out) (i32.const {prefix_len})))

    (block $end
      (loop $copy
        (if (i32.ge_u (local.get $i) (local.get $len))
          (then (return (call $fail (i32.const {msg}) (i32.const {msg_len})))))
        (local.set $c (i32.load8_u (i32.add (local.get $ptr) (local.get $i))))
        (i32.store8 (local.get $o) (local.get $c))
        (local.set $o (i32.add (local.get $o) (i32.const 1)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (if (local.get $in_str)
          (then
            (if (local.get $esc)
              (then (local.set $esc (i32.const 0)))
              (else
                (if (i32.eq (local.get $c) (i32.const 92))
                  (then (local.set $esc (i32.const 1)))
                  (else
                    (if (i32.eq (local.get $c) (i32.const 34))
                      (then (local.set $in_str (i32.const 0)))))))))
          (else
            (if (i32.eq (local.get $c) (i32.const 34))
              (then (local.set $in_str (i32.const 1))))
            (if (i32.eq (local.get $c) (i32.const 123))
              (then (local.set $depth (i32.add (local.get $depth) (i32.const 1)))))
            (if (i32.eq (local.get $c) (i32.const 125))
              (then
                (local.set $depth (i32.sub (local.get $depth) (i32.const 1)))
                (br_if $end (i32.eqz (local.get $depth)))))))
        (br $copy)))

    (i32.store8 (local.get $o) (i32.const 125))
    (local.set $o (i32.add (local.get $o) (i32.const 1)))

    (local.set $pending (call $put (local.get $out) (i32.sub (local.get $o) (local.get $out))))
    (global.set $heap (i32.const {heap}))
    (if (i32.lt_s (local.get $pending) (i32.const 0))
      (then (return (i32.const 1))))
    (call $await (local.get $pending)))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC,
		prefix = wat_string(&prefix),
		prefix_len = prefix.len(),
		needle = NEEDLE,
		msg = MSG_NO_AFTER,
		msg_text = MSG_NO_AFTER_TEXT,
		msg_len = MSG_NO_AFTER_TEXT.len(),
		heap = HEAP_BASE,
		interest_data = interest_data,
		init = init,
	)
}

/// Puts a constant record on every invocation, ignoring the input.
///
/// The put is started without awaiting it, so the invocation only settles
/// through the runtime.
pub fn put_constant(url: &str, record: &str) -> String {
	let params = format!("{}{}}}", params_prefix(url), record);
	format!(
		r#"(module
{imports}
  (memory (export "memory") 4)
  (data (i32.const 0) "{params}")
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (global.set $heap (i32.const {heap}))
    (if (i32.lt_s (call $put (i32.const 0) (i32.const {params_len})) (i32.const 0))
      (then (return (i32.const 1))))
    (i32.const 0))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC,
		params = wat_string(&params),
		params_len = params.len(),
		heap = HEAP_BASE,
	)
}

/// Deletes the record `{"id": <id>}` and waits for the response.
pub fn delete_id(url: &str, id: u32) -> String {
	let params = format!(r#"{}{{"id":{}}}}}"#, params_prefix(url), id);
	format!(
		r#"(module
{imports}
  (memory (export "memory") 4)
  (data (i32.const 0) "{params}")
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (local $pending i32)
    (global.set $heap (i32.const {heap}))
    (local.set $pending (call $delete (i32.const 0) (i32.const {params_len})))
    (if (i32.lt_s (local.get $pending) (i32.const 0))
      (then (return (i32.const 1))))
    (call $await (local.get $pending)))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC,
		params = wat_string(&params),
		params_len = params.len(),
		heap = HEAP_BASE,
	)
}

/// Logs a line, records `message` as the error and rejects every record.
pub fn reject(message: &str) -> String {
	format!(
		r#"(module
{imports}
  (memory (export "memory") 4)
  (data (i32.const {msg}) "{message}")
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (global.set $heap (i32.const {heap}))
    (call $log (local.get $ptr) (local.get $len))
    (call $error (i32.const {msg}) (i32.const {message_len}))
    (i32.const 1))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC,
		msg = MSG,
		message = wat_string(message),
		message_len = message.len(),
		heap = HEAP_BASE,
	)
}

/// Accepts every record without side effects.
pub fn noop() -> String {
	format!(
		r#"(module
  (memory (export "memory") 1)
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (global.set $heap (i32.const {heap}))
    (i32.const 0))
)
"#,
		alloc = ALLOC.replace("65536", "1024"),
		heap = 1024,
	)
}

/// Traps in `init_cdc` after recording `message`.
pub fn failing_init(message: &str) -> String {
	format!(
		r#"(module
{imports}
  (memory (export "memory") 1)
  (data (i32.const 0) "{message}")
{alloc}
  (func (export "init_cdc")
    (call $error (i32.const 0) (i32.const {message_len}))
    unreachable)
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (i32.const 0))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC.replace("65536", "1024"),
		message = wat_string(message),
		message_len = message.len(),
	)
}

/// Exports everything but `handle`.
pub fn missing_handle() -> String {
	format!(
		r#"(module
  (memory (export "memory") 1)
{alloc}
)
"#,
		alloc = ALLOC.replace("65536", "1024"),
	)
}

/// Runs an endless loop in `handle`.
pub fn spin() -> String {
	format!(
		r#"(module
  (memory (export "memory") 1)
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (loop $forever (br $forever))
    (i32.const 0))
)
"#,
		alloc = ALLOC.replace("65536", "1024"),
	)
}

/// Hands `sink.put` a parameter range far past the end of memory.
pub fn oversized_params() -> String {
	format!(
		r#"(module
{imports}
  (memory (export "memory") 1)
{alloc}
  (func (export "handle") (param $ptr i32) (param $len i32) (result i32)
    (global.set $heap (i32.const {heap}))
    (if (i32.lt_s (call $put (i32.const 0) (i32.const 0x7fffffff)) (i32.const 0))
      (then (return (i32.const 1))))
    (i32.const 0))
)
"#,
		imports = IMPORTS,
		alloc = ALLOC.replace("65536", "1024"),
		heap = 1024,
	)
}

/// Writes `wat` to `path` as WebAssembly text.
pub fn write_wat(path: impl AsRef<Path>, wat: &str) -> io::Result<()> {
	if let Some(parent) = path.as_ref().parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, wat)
}

/// Compiles `wat` and writes the binary module to `path`.
pub fn write_wasm(path: impl AsRef<Path>, wat: &str) -> io::Result<()> {
	let bytes = wat::parse_str(wat).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
	if let Some(parent) = path.as_ref().parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, bytes)
}
