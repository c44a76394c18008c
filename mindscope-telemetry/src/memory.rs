use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Span field that groups spans into one request trace.
pub const REQUEST_ID_FIELD: &str = "request.id";

/// A closed span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    #[serde(rename = "span_id")]
    pub id: String,
    pub request_id: String,
    pub name: String,
    #[serde(rename = "parent_span_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Nanoseconds since the Unix epoch.
    pub start_time: u128,
    pub end_time: u128,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl SpanData {
    pub fn duration_nanos(&self) -> u128 {
        self.end_time.saturating_sub(self.start_time)
    }
}

/// Closed spans grouped by request id.
#[derive(Debug, Clone, Default)]
pub struct SharedTraceStorage {
    traces: Arc<RwLock<HashMap<String, Vec<SpanData>>>>,
}

impl SharedTraceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans recorded for `request_id`, in closing order.
    pub fn get_trace(&self, request_id: &str) -> Option<Vec<SpanData>> {
        self.traces.read().ok()?.get(request_id).cloned()
    }

    /// Ids of every request seen so far.
    pub fn request_ids(&self) -> Vec<String> {
        self.traces.read().map(|t| t.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn add_span(&self, request_id: String, span: SpanData) {
        if let Ok(mut traces) = self.traces.write() {
            traces.entry(request_id).or_default().push(span);
        }
    }

    /// Every trace recorded so far, ordered by request id.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<SpanData>> {
        self.traces
            .read()
            .map(|t| t.iter().map(|(id, spans)| (id.clone(), spans.clone())).collect())
            .unwrap_or_default()
    }

    /// Drop the trace for `request_id`, returning it.
    pub fn take_trace(&self, request_id: &str) -> Option<Vec<SpanData>> {
        self.traces.write().ok()?.remove(request_id)
    }
}

/// A tracing layer that keeps closed spans carrying a `request.id` in memory.
///
/// Child spans inherit `request.id` from their parent, so nested work done
/// for a request lands in the same trace.
pub struct InMemoryTraceLayer {
    storage: Arc<SharedTraceStorage>,
}

impl InMemoryTraceLayer {
    pub fn new(storage: Arc<SharedTraceStorage>) -> Self {
        Self { storage }
    }
}

#[derive(Clone)]
struct SpanFields(HashMap<String, serde_json::Value>);

struct StartTime(u128);

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl<S> Layer<S> for InMemoryTraceLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        if !fields.contains_key(REQUEST_ID_FIELD) {
            if let Some(parent) = span.parent() {
                if let Some(parent_fields) = parent.extensions().get::<SpanFields>() {
                    if let Some(request_id) = parent_fields.0.get(REQUEST_ID_FIELD) {
                        fields.insert(REQUEST_ID_FIELD.to_string(), request_id.clone());
                    }
                }
            }
        }

        let mut extensions = span.extensions_mut();
        extensions.insert(StartTime(now_nanos()));
        extensions.insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let extensions = span.extensions();
        let Some(fields) = extensions.get::<SpanFields>() else { return };
        let Some(request_id) = fields.0.get(REQUEST_ID_FIELD).and_then(|v| v.as_str()).map(str::to_string) else {
            return;
        };

        let span_data = SpanData {
            id: format!("{:016x}", id.into_u64()),
            request_id: request_id.clone(),
            name: span.metadata().name().to_string(),
            parent_id: span.parent().map(|p| format!("{:016x}", p.id().into_u64())),
            start_time: extensions.get::<StartTime>().map(|s| s.0).unwrap_or(0),
            end_time: now_nanos(),
            attributes: fields.0.clone(),
        };
        self.storage.add_span(request_id, span_data);
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
