use std::sync::Arc;

use tracing::{Instrument, info_span};
use tracing_subscriber::layer::SubscriberExt;

use crate::memory::{InMemoryTraceLayer, SharedTraceStorage};

fn capture<T>(storage: &Arc<SharedTraceStorage>, work: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::registry().with(InMemoryTraceLayer::new(storage.clone()));
    tracing::subscriber::with_default(subscriber, work)
}

#[test]
fn spans_are_grouped_by_request_id() {
    let storage = Arc::new(SharedTraceStorage::new());
    capture(&storage, || {
        let span = info_span!("clinic.chat", request.id = "req-1", history = 4u64);
        let _guard = span.enter();
        tracing::info!("processing chat message");
    });

    let spans = storage.get_trace("req-1").expect("trace captured");
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "clinic.chat");
    assert_eq!(span.attributes["history"], 4);
    assert!(span.start_time > 0);
    assert!(span.end_time >= span.start_time);
}

#[test]
fn child_spans_inherit_the_request_id() {
    let storage = Arc::new(SharedTraceStorage::new());
    capture(&storage, || {
        let parent = info_span!("clinic.analyze_video", request.id = "req-2");
        let _outer = parent.enter();
        let child = info_span!("rag.retrieve", k = 3u64);
        let _inner = child.enter();
    });

    let spans = storage.get_trace("req-2").expect("trace captured");
    let names: Vec<_> = spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["rag.retrieve", "clinic.analyze_video"]);
    assert_eq!(spans[0].parent_id.as_deref(), Some(spans[1].id.as_str()));
}

#[test]
fn spans_without_request_id_are_ignored() {
    let storage = Arc::new(SharedTraceStorage::new());
    capture(&storage, || {
        let _guard = info_span!("index.build").entered();
    });
    assert!(storage.request_ids().is_empty());
}

#[tokio::test]
async fn instrumented_futures_are_captured() {
    let storage = Arc::new(SharedTraceStorage::new());
    let subscriber = tracing_subscriber::registry().with(InMemoryTraceLayer::new(storage.clone()));
    let _default = tracing::subscriber::set_default(subscriber);

    async { tracing::info!("generating response") }
        .instrument(info_span!("clinic.generate_raw", request.id = "req-3"))
        .await;

    let spans = storage.take_trace("req-3").expect("trace captured");
    assert_eq!(spans[0].name, "clinic.generate_raw");
    assert!(storage.get_trace("req-3").is_none());
}

#[test]
fn snapshot_orders_traces_by_request_id() {
    let storage = Arc::new(SharedTraceStorage::new());
    capture(&storage, || {
        let _b = info_span!("clinic.chat", request.id = "req-b").entered();
        let _a = info_span!("clinic.generate_raw", request.id = "req-a").entered();
    });

    let snapshot = storage.snapshot();
    let ids: Vec<_> = snapshot.keys().map(String::as_str).collect();
    assert_eq!(ids, ["req-a", "req-b"]);
    assert_eq!(snapshot["req-b"][0].name, "clinic.chat");
    assert_eq!(storage.request_ids().len(), 2);
}
