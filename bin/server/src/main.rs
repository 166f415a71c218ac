// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, io, path::PathBuf, process::ExitCode};

use switchyard::{DEFAULT_CONFIG_FILE, Result, ServerConfig};
use tracing::{error, info};

fn main() -> ExitCode {
	let path = env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
	match run(path) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!(error = %e, "switchyard failed");
			eprintln!("switchyard: {e}");
			ExitCode::FAILURE
		}
	}
}

fn run(path: PathBuf) -> Result<()> {
	let config = ServerConfig::load_or_default(&path)?;
	let mut switchyard = config.into_builder().build()?;
	info!(config = %path.display(), "configuration loaded");

	switchyard.start()?;
	if let Err(e) = wait_for_ctrl_c() {
		error!(error = %e, "cannot listen for ctrl-c, shutting down");
	}
	switchyard.shutdown();
	Ok(())
}

fn wait_for_ctrl_c() -> io::Result<()> {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().thread_name("signal").build()?;
	runtime.block_on(tokio::signal::ctrl_c())?;
	info!("ctrl-c received");
	Ok(())
}
