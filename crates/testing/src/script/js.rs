// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! JavaScript scripts used across the test suites.

use std::{fs, io, path::Path};

use serde_json::json;

fn params(url: &str) -> String {
	json!({
		"url": url,
		"username": "elastic",
		"password": "changeme",
		"idKey": "id",
	})
	.to_string()
}

fn init_cdc(databases: &[&str], tables: &[&str]) -> String {
	format!(
		"export async function initCDC() {{\n\treturn {};\n}}\n",
		json!({
			"databases": databases,
			"tables": tables,
		})
	)
}

/// Forwards the payload's `after` image to `es.put` and awaits the response.
///
/// The optional interest is returned from `initCDC`.
pub fn put_after(url: &str, databases: &[&str], tables: &[&str]) -> String {
	format!(
		r#"const params = {params};

{init}
export default async function (record) {{
	const change = JSON.parse(record).payload || {{}};
	if (!change.after) {{
		throw new Error("record has no after object");
	}}
	const body = await es.put({{ ...params, records: [change.after] }});
	console.log("indexed", body);
}}
"#,
		params = params(url),
		init = init_cdc(databases, tables),
	)
}

/// Starts a put of the constant `record` without awaiting it.
pub fn put_constant(url: &str, record: &str) -> String {
	format!(
		r#"const params = {params};

export default async function () {{
	es.put({{ ...params, records: {record} }});
}}
"#,
		params = params(url),
	)
}

/// Deletes the document whose `id` the payload carries in its `before` image.
pub fn delete_before(url: &str) -> String {
	format!(
		r#"const params = {params};

export default async function (record) {{
	const change = JSON.parse(record).payload || {{}};
	await es.delete({{ ...params, records: [{{ id: change.before.id }}] }});
}}
"#,
		params = params(url),
	)
}

/// Rejects every record with `message`.
pub fn reject(message: &str) -> String {
	format!(
		"export default async function () {{\n\tthrow new Error({});\n}}\n",
		json!(message),
	)
}

/// Accepts every record without side effects.
pub fn noop() -> String {
	"export default async function () {}\n".to_string()
}

/// Throws `message` from `initCDC`.
pub fn failing_init(message: &str) -> String {
	format!(
		"export function initCDC() {{\n\tthrow new Error({});\n}}\n\nexport default async function () {{}}\n",
		json!(message),
	)
}

/// Exports `initCDC` but no default function.
pub fn missing_default() -> String {
	"export function initCDC() {}\n".to_string()
}

/// Does not parse.
pub fn syntax_error() -> String {
	"export default async function ( {\n".to_string()
}

/// Never returns from its default export.
pub fn spin() -> String {
	"export default async function () {\n\tfor (;;) {}\n}\n".to_string()
}

/// Writes `source` to `path`, creating parent directories.
pub fn write_js(path: impl AsRef<Path>, source: &str) -> io::Result<()> {
	if let Some(parent) = path.as_ref().parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, source)
}
