// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread,
	time::Duration,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use futures_util::future::BoxFuture;
use switchyard_core::{ScriptError, ScriptId};
use switchyard_script::{RuntimeConfig, ScriptRuntime};
use switchyard_sink::{MemorySink, Sink, SinkError, SinkRequest, plan::Method};
use switchyard_testing::{
	script::{
		delete_id, failing_init, missing_handle, noop, oversized_params, put_after, put_constant, reject, spin,
		write_wasm, write_wat,
	},
	temp_dir,
};

const URL: &str = "http://search:9200/orders";
const RECORD: &str = r#"{"payload":{"op":"c","before":null,"after":{"id":1,"name":"widget"},"source":{"db":"shop","table":"orders"}}}"#;

fn runtime(sink: MemorySink) -> ScriptRuntime {
	ScriptRuntime::new(RuntimeConfig::default(), Arc::new(sink)).unwrap()
}

#[test]
fn test_execute_forwards_after_image() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("orders");
		let path = dir.join("orders.wat");
		write_wat(&path, &put_after(URL, &[], &[]))?;

		runtime.register(&id, &path).unwrap();
		runtime.execute(&id, RECORD).unwrap();

		let requests = sink.requests();
		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].method, Method::Put);
		assert_eq!(requests[0].url, format!("{}/_doc/1", URL));
		assert_eq!(requests[0].body.as_deref(), Some(r#"{"id":1,"name":"widget"}"#));
		assert_eq!(requests[0].credentials.username, "elastic");
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_binary_module_registers() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("purge");
		let path = dir.join("purge.wasm");
		write_wasm(&path, &delete_id(URL, 7))?;

		runtime.register(&id, &path).unwrap();
		runtime.execute(&id, RECORD).unwrap();

		let requests = sink.requests();
		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].method, Method::Delete);
		assert_eq!(requests[0].url, format!("{}/_doc/7", URL));
		assert_eq!(requests[0].body, None);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_init_declares_interest() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("orders");
		let path = dir.join("orders.wat");
		write_wat(&path, &put_after(URL, &["shop"], &["shop.orders", "customers"]))?;

		let interest = runtime.register(&id, &path).unwrap();
		assert!(interest.databases.contains("shop"));
		assert!(interest.tables.contains("shop.orders"));
		assert!(interest.tables.contains("customers"));
		assert_eq!(runtime.interest(&id), Some(interest));
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_script_without_init_wants_everything() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("noop");
		let path = dir.join("noop.wat");
		write_wat(&path, &noop())?;

		assert!(runtime.register(&id, &path).unwrap().is_everything());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_failing_init_is_not_registered() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("broken");
		let path = dir.join("broken.wat");
		write_wat(&path, &failing_init("boom"))?;

		let err = runtime.register(&id, &path).unwrap_err();
		assert_eq!(
			err,
			ScriptError::Init {
				script: id.clone(),
				message: "boom".to_string(),
			}
		);
		assert!(runtime.scripts().is_empty());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_missing_export() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("partial");
		let path = dir.join("partial.wat");
		write_wat(&path, &missing_handle())?;

		let err = runtime.register(&id, &path).unwrap_err();
		assert_eq!(
			err,
			ScriptError::MissingExport {
				script: id,
				export: "handle",
			}
		);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_invalid_module_fails_to_load() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("garbage");
		let path = dir.join("garbage.wat");
		write_wat(&path, "(module (func")?;

		let err = runtime.register(&id, &path).unwrap_err();
		assert!(matches!(err, ScriptError::Load { .. }), "{err:?}");
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_rejection_carries_message() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("strict");
		let path = dir.join("strict.wat");
		write_wat(&path, &reject("no thanks"))?;
		runtime.register(&id, &path).unwrap();

		let err = runtime.execute(&id, RECORD).unwrap_err();
		assert_eq!(
			err,
			ScriptError::Rejected {
				script: id,
				message: "no thanks".to_string(),
			}
		);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_sink_parameters_past_memory_are_rejected() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("oversized");
		let path = dir.join("oversized.wat");
		write_wat(&path, &oversized_params())?;
		runtime.register(&id, &path).unwrap();

		let err = runtime.execute(&id, RECORD).unwrap_err();
		assert_eq!(
			err,
			ScriptError::Rejected {
				script: id,
				message: "sink parameters out of bounds".to_string(),
			}
		);
		assert!(sink.requests().is_empty());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_record_without_after_is_rejected() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("orders");
		let path = dir.join("orders.wat");
		write_wat(&path, &put_after(URL, &[], &[]))?;
		runtime.register(&id, &path).unwrap();

		let err = runtime.execute(&id, r#"{"payload":{"op":"d","before":{"id":1}}}"#).unwrap_err();
		assert!(matches!(err, ScriptError::Rejected { ref message, .. } if message == "record has no after object"));
		assert!(sink.requests().is_empty());

		// the instance survives a rejection
		runtime.execute(&id, RECORD).unwrap();
		assert_eq!(sink.requests().len(), 1);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_sink_failure_rejects_execution() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("orders");
		let path = dir.join("orders.wat");
		write_wat(&path, &put_after(URL, &[], &[]))?;
		runtime.register(&id, &path).unwrap();

		sink.fail_with(SinkError::Status {
			status: 503,
			body: "unavailable".to_string(),
		});
		let err = runtime.execute(&id, RECORD).unwrap_err();
		assert!(matches!(err, ScriptError::Rejected { ref message, .. } if message.contains("503")), "{err:?}");
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_unawaited_put_failure_rejects_execution() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("constant");
		let path = dir.join("constant.wat");
		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v1"}"#))?;
		runtime.register(&id, &path).unwrap();

		sink.fail_with(SinkError::Transport("connection refused".to_string()));
		let err = runtime.execute(&id, RECORD).unwrap_err();
		assert!(matches!(err, ScriptError::Rejected { ref message, .. } if message.contains("connection refused")));
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_reload_switches_version() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("constant");
		let path = dir.join("constant.wat");

		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v1"}"#))?;
		runtime.register(&id, &path).unwrap();
		let first = runtime.descriptor(&id).unwrap().version;
		runtime.execute(&id, RECORD).unwrap();

		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v2"}"#))?;
		runtime.reload(&id).unwrap();
		assert!(runtime.descriptor(&id).unwrap().version > first);
		runtime.execute(&id, RECORD).unwrap();

		let bodies: Vec<_> = sink.requests().into_iter().filter_map(|r| r.body).collect();
		assert_eq!(bodies, vec![r#"{"id":1,"version":"v1"}"#, r#"{"id":1,"version":"v2"}"#]);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_failed_reload_keeps_previous_version() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let runtime = runtime(sink.clone());
		let id = ScriptId::from("constant");
		let path = dir.join("constant.wat");

		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v1"}"#))?;
		runtime.register(&id, &path).unwrap();

		write_wat(&path, &failing_init("boom"))?;
		assert!(runtime.reload(&id).is_err());

		runtime.execute(&id, RECORD).unwrap();
		assert_eq!(sink.requests()[0].body.as_deref(), Some(r#"{"id":1,"version":"v1"}"#));
		Ok(())
	})
	.unwrap();
}

/// Holds the first put until the test releases it.
struct GateSink {
	inner: MemorySink,
	held: AtomicBool,
	entered: Sender<()>,
	release: Receiver<()>,
}

impl Sink for GateSink {
	fn put(&self, request: SinkRequest) -> BoxFuture<'static, switchyard_sink::Result<String>> {
		let operation = self.inner.put(request);
		let hold = !self.held.swap(true, Ordering::SeqCst);
		let entered = self.entered.clone();
		let release = self.release.clone();
		Box::pin(async move {
			if hold {
				let _ = entered.send(());
				let _ = release.recv_timeout(Duration::from_secs(5));
			}
			operation.await
		})
	}

	fn delete(&self, request: SinkRequest) -> BoxFuture<'static, switchyard_sink::Result<String>> {
		self.inner.delete(request)
	}
}

#[test]
fn test_in_flight_execution_finishes_on_old_version() {
	temp_dir(|dir| {
		let memory = MemorySink::new();
		let (entered_tx, entered_rx) = bounded(1);
		let (release_tx, release_rx) = bounded(1);
		let sink = GateSink {
			inner: memory.clone(),
			held: AtomicBool::new(false),
			entered: entered_tx,
			release: release_rx,
		};
		let runtime = ScriptRuntime::new(RuntimeConfig::default(), Arc::new(sink)).unwrap();
		let id = ScriptId::from("constant");
		let path = dir.join("constant.wat");

		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v1"}"#))?;
		runtime.register(&id, &path).unwrap();

		let worker = {
			let runtime = runtime.clone();
			let id = id.clone();
			thread::spawn(move || runtime.execute(&id, RECORD))
		};
		entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

		write_wat(&path, &put_constant(URL, r#"{"id":1,"version":"v2"}"#))?;
		runtime.reload(&id).unwrap();
		release_tx.send(()).unwrap();
		worker.join().unwrap().unwrap();

		runtime.execute(&id, RECORD).unwrap();
		let bodies: Vec<_> = memory.requests().into_iter().filter_map(|r| r.body).collect();
		assert_eq!(bodies, vec![r#"{"id":1,"version":"v1"}"#, r#"{"id":1,"version":"v2"}"#]);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_each_thread_gets_own_context() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("noop");
		let path = dir.join("noop.wat");
		write_wat(&path, &noop())?;
		runtime.register(&id, &path).unwrap();

		let workers: Vec<_> = (0..3)
			.map(|_| {
				let runtime = runtime.clone();
				let id = id.clone();
				thread::spawn(move || {
					for _ in 0..10 {
						runtime.execute(&id, RECORD).unwrap();
					}
				})
			})
			.collect();
		for worker in workers {
			worker.join().unwrap();
		}
		assert_eq!(runtime.context_count(), 3);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_unregistered_script() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("noop");
		let path = dir.join("noop.wat");
		write_wat(&path, &noop())?;
		runtime.register(&id, &path).unwrap();

		assert!(runtime.unregister(&id));
		assert!(!runtime.unregister(&id));
		assert_eq!(
			runtime.execute(&id, RECORD),
			Err(ScriptError::NotRegistered {
				script: id,
			})
		);
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_shutdown_interrupts_running_script() {
	temp_dir(|dir| {
		let runtime = runtime(MemorySink::new());
		let id = ScriptId::from("spin");
		let path = dir.join("spin.wat");
		write_wat(&path, &spin())?;
		runtime.register(&id, &path).unwrap();

		let worker = {
			let runtime = runtime.clone();
			let id = id.clone();
			thread::spawn(move || runtime.execute(&id, RECORD))
		};
		thread::sleep(Duration::from_millis(200));

		runtime.shutdown();
		assert_eq!(worker.join().unwrap(), Err(ScriptError::Shutdown));
		assert!(runtime.is_shut_down());
		assert!(runtime.scripts().is_empty());
		assert_eq!(runtime.register(&id, &path), Err(ScriptError::Shutdown));
		Ok(())
	})
	.unwrap();
}
