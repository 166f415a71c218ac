// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use switchyard_core::{ScriptError, ScriptId};
use switchyard_scheduler::{SchedulerConfig, SchedulerError, ScriptScheduler};

fn scheduler(threads: usize) -> ScriptScheduler {
	ScriptScheduler::new(SchedulerConfig::default().threads(threads).shutdown_timeout(Duration::from_millis(200)))
		.unwrap()
}

#[test]
fn test_serial_work_never_overlaps_and_completes_in_order() {
	let scheduler = scheduler(4);
	let script = ScriptId::from("orders");
	let running = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));
	let order = Arc::new(Mutex::new(Vec::new()));

	let completions: Vec<_> = (0..20)
		.map(|i| {
			let running = running.clone();
			let overlaps = overlaps.clone();
			let order = order.clone();
			scheduler
				.schedule(&script, true, move || {
					if running.fetch_add(1, Ordering::SeqCst) > 0 {
						overlaps.fetch_add(1, Ordering::SeqCst);
					}
					thread::sleep(Duration::from_millis(2));
					order.lock().push(i);
					running.fetch_sub(1, Ordering::SeqCst);
					Ok(())
				})
				.unwrap()
		})
		.collect();

	for completion in completions {
		completion.wait().unwrap();
	}
	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
}

#[test]
fn test_parallel_work_overlaps() {
	let scheduler = scheduler(4);
	let script = ScriptId::from("metrics");
	let running = Arc::new(AtomicUsize::new(0));
	let peak = Arc::new(AtomicUsize::new(0));

	let completions: Vec<_> = (0..4)
		.map(|_| {
			let running = running.clone();
			let peak = peak.clone();
			scheduler
				.schedule(&script, false, move || {
					let now = running.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					thread::sleep(Duration::from_millis(100));
					running.fetch_sub(1, Ordering::SeqCst);
					Ok(())
				})
				.unwrap()
		})
		.collect();

	for completion in completions {
		completion.wait().unwrap();
	}
	assert!(peak.load(Ordering::SeqCst) > 1);
}

#[test]
fn test_serial_gates_are_per_script() {
	let scheduler = scheduler(2);
	let (release_tx, release_rx) = bounded::<()>(1);

	let blocked = scheduler
		.schedule(&ScriptId::from("slow"), true, move || {
			let _ = release_rx.recv_timeout(Duration::from_secs(5));
			Ok(())
		})
		.unwrap();

	// another script is not held up by the first one's gate
	scheduler.schedule(&ScriptId::from("fast"), true, || Ok(())).unwrap().wait().unwrap();

	release_tx.send(()).unwrap();
	blocked.wait().unwrap();
}

#[test]
fn test_work_result_is_returned() {
	let scheduler = scheduler(1);
	let script = ScriptId::from("strict");
	let err = scheduler
		.schedule(&script, true, {
			let script = script.clone();
			move || {
				Err(ScriptError::Rejected {
					script,
					message: "nope".to_string(),
				})
			}
		})
		.unwrap()
		.wait()
		.unwrap_err();
	assert!(matches!(err, ScriptError::Rejected { ref message, .. } if message == "nope"));
}

#[test]
fn test_panic_becomes_error_and_releases_gate() {
	let scheduler = scheduler(1);
	let script = ScriptId::from("fragile");

	let err = scheduler.schedule(&script, true, || panic!("kaboom")).unwrap().wait().unwrap_err();
	assert_eq!(
		err,
		ScriptError::Panicked {
			script: script.clone(),
			message: "kaboom".to_string(),
		}
	);

	scheduler.schedule(&script, true, || Ok(())).unwrap().wait().unwrap();
}

#[test]
fn test_closed_scheduler_rejects_work() {
	let scheduler = scheduler(1);
	scheduler.close();
	assert!(scheduler.is_closed());
	assert_eq!(
		scheduler.schedule(&ScriptId::from("late"), false, || Ok(())).err(),
		Some(SchedulerError::Closed)
	);
}

#[test]
fn test_close_abandons_queued_work() {
	let scheduler = scheduler(1);
	let (started_tx, started_rx) = bounded::<()>(1);
	let (release_tx, release_rx) = bounded::<()>(1);

	let running = scheduler
		.schedule(&ScriptId::from("busy"), false, move || {
			started_tx.send(()).unwrap();
			let _ = release_rx.recv_timeout(Duration::from_secs(5));
			Ok(())
		})
		.unwrap();
	started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
	let queued = scheduler.schedule(&ScriptId::from("queued"), false, || Ok(())).unwrap();

	// returns after the shutdown timeout with work still running
	scheduler.close();
	release_tx.send(()).unwrap();

	running.wait().unwrap();
	assert_eq!(
		queued.wait(),
		Err(ScriptError::Abandoned {
			script: ScriptId::from("queued"),
		})
	);
}

#[test]
fn test_close_wakes_callers_waiting_on_gate() {
	let scheduler = scheduler(1);
	let script = ScriptId::from("orders");
	let (release_tx, release_rx) = bounded::<()>(1);

	let first = scheduler
		.schedule(&script, true, move || {
			let _ = release_rx.recv_timeout(Duration::from_secs(5));
			Ok(())
		})
		.unwrap();

	let waiter = {
		let scheduler = scheduler.clone();
		let script = script.clone();
		thread::spawn(move || scheduler.schedule(&script, true, || Ok(())).err())
	};
	thread::sleep(Duration::from_millis(50));

	scheduler.close();
	assert_eq!(waiter.join().unwrap(), Some(SchedulerError::Closed));

	release_tx.send(()).unwrap();
	first.wait().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_completion_is_awaitable() {
	let scheduler = scheduler(2);
	let completion = scheduler.schedule(&ScriptId::from("async"), false, || Ok(())).unwrap();
	assert_eq!(completion.await, Ok(()));
}
