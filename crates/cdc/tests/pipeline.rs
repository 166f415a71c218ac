// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeSet,
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use futures_util::future::{self, BoxFuture};
use switchyard_cdc::{
	CdcError, Connector, ConnectorFactory, ConnectorManager, ConnectorProperties, Pipeline, PipelineConfig,
};
use switchyard_core::{ConfigError, DbKind, ScriptId, SourceConfig};
use switchyard_log::{EventLogConfig, LogRegistry};
use switchyard_runtime::CancellationToken;
use switchyard_scheduler::{SchedulerConfig, ScriptScheduler};
use switchyard_script::{RuntimeConfig, ScriptRuntime};
use switchyard_sink::{MemorySink, Sink, SinkError, SinkRequest, plan::Method};
use switchyard_testing::{
	script::{put_after, spin, write_wat},
	temp_dir, wait_for,
};

const URL: &str = "http://search:9200/orders";

fn record(id: u32, table: &str) -> String {
	format!(
		r#"{{"payload":{{"op":"c","before":null,"after":{{"id":{id},"name":"item-{id}"}},"source":{{"db":"shop","table":"{table}"}}}}}}"#
	)
}

fn mysql(name: &str) -> SourceConfig {
	SourceConfig {
		name: name.to_string(),
		kind: DbKind::Mysql,
		databases: BTreeSet::from(["shop".to_string()]),
		tables: BTreeSet::new(),
		host: "db.internal".to_string(),
		port: 3306,
		username: "cdc".to_string(),
		password: "secret".to_string(),
		server_id: Some(5400),
	}
}

struct Harness {
	runtime: ScriptRuntime,
	scheduler: ScriptScheduler,
	pipeline: Pipeline,
	logs: Arc<LogRegistry>,
}

impl Harness {
	fn new(dir: &Path, sink: Arc<dyn Sink>) -> Self {
		let runtime = ScriptRuntime::new(RuntimeConfig::default(), sink).unwrap();
		let scheduler = ScriptScheduler::new(SchedulerConfig::default().threads(2)).unwrap();
		let logs = Arc::new(LogRegistry::new(dir.join("queue"), EventLogConfig::default()));
		let pipeline = Pipeline::new(PipelineConfig::default(), logs.clone(), runtime.clone(), scheduler.clone());
		Self {
			runtime,
			scheduler,
			pipeline,
			logs,
		}
	}

	fn register(&self, dir: &Path, name: &str, wat: &str) -> ScriptId {
		let id = ScriptId::from(name);
		let path = dir.join("scripts").join(format!("{name}.wat"));
		write_wat(&path, wat).unwrap();
		self.runtime.register(&id, &path).unwrap();
		id
	}

	fn shutdown(&self) {
		self.runtime.shutdown();
		self.scheduler.close();
		self.pipeline.shutdown();
	}
}

#[test]
fn test_create_record_reaches_sink_as_single_document() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(sink.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));

		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		assert_eq!(harness.pipeline.subscribe(&script).unwrap(), 1);

		assert!(handler.handle(Some(&record(1, "orders"))).unwrap().is_some());

		wait_for(|| sink.requests().len() == 1, "sink request");
		let request = &sink.requests()[0];
		assert_eq!(request.method, Method::Put);
		assert_eq!(request.url, format!("{URL}/_doc/1"));
		assert_eq!(request.body.as_deref(), Some(r#"{"id":1,"name":"item-1"}"#));

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_dropped_events_never_reach_scripts() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(sink.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		harness.pipeline.subscribe(&script).unwrap();

		assert_eq!(handler.handle(None).unwrap(), None);
		assert_eq!(handler.handle(Some(r#"{"payload":{"ddl":"DROP TABLE t","op":"c","after":{}}}"#)).unwrap(), None);
		assert_eq!(handler.handle(Some("{broken")).unwrap(), None);
		handler.handle(Some(&record(2, "orders"))).unwrap();

		wait_for(|| sink.requests().len() == 1, "sink request");
		assert_eq!(sink.requests()[0].url, format!("{URL}/_doc/2"));
		assert_eq!(handler.normalizer().dropped(), 3);

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_records_outside_interest_are_skipped() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(sink.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &["shop"], &["shop.orders"]));
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		harness.pipeline.subscribe(&script).unwrap();

		handler.handle(Some(&record(1, "customers"))).unwrap();
		handler.handle(Some(&record(2, "orders"))).unwrap();

		wait_for(|| sink.requests().len() == 1, "sink request");
		assert_eq!(sink.requests()[0].url, format!("{URL}/_doc/2"));

		// both records are committed
		harness.pipeline.unsubscribe(&script);
		let log = harness.logs.get(&mysql("shop").identity()).unwrap();
		assert!(log.open_cursor(&script).unwrap().read_next().unwrap().is_none());

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_sources_outside_interest_get_no_reader() {
	temp_dir(|dir| {
		let harness = Harness::new(dir, Arc::new(MemorySink::new()));
		let script = harness.register(dir, "billing", &put_after(URL, &["billing"], &[]));
		harness.pipeline.attach_source(&mysql("shop")).unwrap();

		assert_eq!(harness.pipeline.subscribe(&script).unwrap(), 0);
		assert_eq!(harness.pipeline.reader_count(), 0);

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_source_attached_after_subscribe_gets_reader() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(sink.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));

		assert_eq!(harness.pipeline.subscribe(&script).unwrap(), 0);
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		assert_eq!(harness.pipeline.reader_count(), 1);

		handler.handle(Some(&record(3, "orders"))).unwrap();
		wait_for(|| sink.requests().len() == 1, "sink request");

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_restart_resumes_after_last_committed_record() {
	temp_dir(|dir| {
		let first = MemorySink::new();
		{
			let harness = Harness::new(dir, Arc::new(first.clone()));
			let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
			let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
			harness.pipeline.subscribe(&script).unwrap();

			handler.handle(Some(&record(1, "orders"))).unwrap();
			wait_for(|| first.requests().len() == 1, "first run");
			harness.shutdown();
		}

		let second = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(second.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		handler.handle(Some(&record(2, "orders"))).unwrap();
		harness.pipeline.subscribe(&script).unwrap();

		wait_for(|| second.requests().len() == 1, "second run");
		assert_eq!(second.requests()[0].url, format!("{URL}/_doc/2"));

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

/// Counts every put and fails all of them.
#[derive(Default)]
struct FailingSink {
	calls: AtomicUsize,
}

impl Sink for FailingSink {
	fn put(&self, _request: SinkRequest) -> BoxFuture<'static, switchyard_sink::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		Box::pin(future::ready(Err(SinkError::Transport("connection refused".to_string()))))
	}

	fn delete(&self, request: SinkRequest) -> BoxFuture<'static, switchyard_sink::Result<String>> {
		self.put(request)
	}
}

#[test]
fn test_failed_executions_still_advance_cursor() {
	temp_dir(|dir| {
		let sink = Arc::new(FailingSink::default());
		let harness = Harness::new(dir, sink.clone());
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		harness.pipeline.subscribe(&script).unwrap();

		handler.handle(Some(&record(1, "orders"))).unwrap();
		handler.handle(Some(&record(2, "orders"))).unwrap();
		wait_for(|| sink.calls.load(Ordering::SeqCst) == 2, "both attempts");

		harness.pipeline.unsubscribe(&script);
		let log = harness.logs.get(&mysql("shop").identity()).unwrap();
		assert!(log.open_cursor(&script).unwrap().read_next().unwrap().is_none());
		assert_eq!(sink.calls.load(Ordering::SeqCst), 2);

		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_unsubscribe_and_shutdown() {
	temp_dir(|dir| {
		let harness = Harness::new(dir, Arc::new(MemorySink::new()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
		harness.pipeline.attach_source(&mysql("shop")).unwrap();
		let mut warehouse = mysql("warehouse");
		warehouse.host = "db2.internal".to_string();
		harness.pipeline.attach_source(&warehouse).unwrap();

		assert_eq!(harness.pipeline.subscribe(&script).unwrap(), 2);
		assert_eq!(harness.pipeline.resubscribe(&script).unwrap(), 2);
		assert_eq!(harness.pipeline.unsubscribe(&script), 2);
		assert!(!harness.pipeline.is_subscribed(&script));

		harness.pipeline.shutdown();
		assert!(matches!(harness.pipeline.subscribe(&script), Err(CdcError::Shutdown)));
		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_resubscribe_does_not_wait_for_a_running_script() {
	temp_dir(|dir| {
		let harness = Harness::new(dir, Arc::new(MemorySink::new()));
		let script = harness.register(dir, "stuck", &spin());
		let handler = harness.pipeline.attach_source(&mysql("shop")).unwrap();
		harness.pipeline.subscribe(&script).unwrap();

		handler.handle(Some(&record(1, "orders"))).unwrap();
		wait_for(|| harness.scheduler.in_flight() == 1, "script running");

		let generation = harness.pipeline.subscription(&script).unwrap();
		let started = Instant::now();
		assert_eq!(harness.pipeline.resubscribe(&script).unwrap(), 1);
		assert!(started.elapsed() < Duration::from_secs(2), "resubscribe took {:?}", started.elapsed());
		assert!(harness.pipeline.subscription(&script).unwrap() > generation);
		assert_eq!(harness.pipeline.readers_of(&script), 1);

		let started = Instant::now();
		harness.shutdown();
		assert!(started.elapsed() < Duration::from_secs(5), "shutdown took {:?}", started.elapsed());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_unregistered_script_cannot_subscribe() {
	temp_dir(|dir| {
		let harness = Harness::new(dir, Arc::new(MemorySink::new()));
		assert!(matches!(harness.pipeline.subscribe(&ScriptId::from("ghost")), Err(CdcError::Script(_))));
		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

/// Emits a fixed batch of raw events and idles until cancelled.
struct ReplayConnector {
	events: Vec<Option<String>>,
}

impl Connector for ReplayConnector {
	fn run(
		&mut self,
		emit: &mut dyn FnMut(Option<&str>),
		cancel: &CancellationToken,
	) -> switchyard_cdc::Result<()> {
		for event in self.events.drain(..) {
			emit(event.as_deref());
		}
		while !cancel.wait_timeout(std::time::Duration::from_millis(10)) {}
		Ok(())
	}
}

struct ReplayFactory {
	events: Vec<Option<String>>,
	names: parking_lot::Mutex<Vec<String>>,
}

impl ConnectorFactory for ReplayFactory {
	fn create(&self, properties: &ConnectorProperties) -> switchyard_cdc::Result<Box<dyn Connector>> {
		self.names.lock().push(properties.name().to_string());
		Ok(Box::new(ReplayConnector {
			events: self.events.clone(),
		}))
	}
}

#[test]
fn test_connector_manager_feeds_pipeline() {
	temp_dir(|dir| {
		let sink = MemorySink::new();
		let harness = Harness::new(dir, Arc::new(sink.clone()));
		let script = harness.register(dir, "orders", &put_after(URL, &[], &[]));
		harness.pipeline.subscribe(&script).unwrap();

		let factory = Arc::new(ReplayFactory {
			events: vec![None, Some(r#"{"payload":{"op":"c"}}"#.to_string()), Some(record(9, "orders"))],
			names: parking_lot::Mutex::new(Vec::new()),
		});
		let manager = ConnectorManager::new(harness.pipeline.clone(), factory.clone(), dir.join("offset"));

		let source = mysql("shop");
		assert!(manager.run(&source).unwrap());
		assert!(!manager.run(&source).unwrap());
		assert_eq!(*factory.names.lock(), vec!["mysql-shop".to_string()]);

		wait_for(|| sink.requests().len() == 1, "record from connector");
		assert_eq!(sink.requests()[0].url, format!("{URL}/_doc/9"));
		assert!(manager.is_running(&source.identity()));

		manager.shutdown();
		assert!(!manager.is_running(&source.identity()));
		harness.shutdown();
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_connector_manager_rejects_invalid_source() {
	temp_dir(|dir| {
		let harness = Harness::new(dir, Arc::new(MemorySink::new()));
		let factory = Arc::new(ReplayFactory {
			events: Vec::new(),
			names: parking_lot::Mutex::new(Vec::new()),
		});
		let manager = ConnectorManager::new(harness.pipeline.clone(), factory.clone(), dir.join("offset"));

		let mut source = mysql("shop");
		source.server_id = None;
		assert!(matches!(manager.run(&source), Err(CdcError::Config(ConfigError::InvalidServerId { .. }))));
		assert!(factory.names.lock().is_empty());
		harness.shutdown();
		Ok(())
	})
	.unwrap();
}
