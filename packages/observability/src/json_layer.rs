//! JSON lines for the queue log.
//!
//! Each event becomes one object. The request context the queue crates log
//! (`request_id`, `command`, `attempt`) is lifted out of the free-form
//! fields to the top level, so one request can be followed through the file
//! with `jq 'select(.request_id == "...")'`. Events emitted inside a span
//! that carries request context inherit whatever they do not set themselves.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// The request a log line is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Which send of this request, starting at 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u64>,
}

impl RequestContext {
    fn is_empty(&self) -> bool {
        self.request_id.is_none() && self.command.is_none() && self.attempt.is_none()
    }

    /// Fill the slots still empty from an enclosing context.
    fn inherit(&mut self, outer: &RequestContext) {
        if self.request_id.is_none() {
            self.request_id.clone_from(&outer.request_id);
        }
        if self.command.is_none() {
            self.command.clone_from(&outer.command);
        }
        if self.attempt.is_none() {
            self.attempt = outer.attempt;
        }
    }

    fn update(&mut self, newer: RequestContext) {
        let mut merged = newer;
        merged.inherit(self);
        *self = merged;
    }
}

/// One line of the queue log.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: &'static str,
    pub service: String,
    pub target: String,
    pub message: String,
    #[serde(flatten)]
    pub request: RequestContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Innermost span the event was emitted in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

#[derive(Default)]
struct LineVisitor {
    request: RequestContext,
    message: Option<String>,
    error: Option<String>,
    fields: Map<String, Value>,
}

impl LineVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = Some(into_text(value)),
            "error" => self.error = Some(into_text(value)),
            "request_id" => self.request.request_id = Some(into_text(value)),
            "command" => self.request.command = Some(into_text(value)),
            "attempt" => match value.as_u64() {
                Some(n) => self.request.attempt = Some(n),
                None => {
                    self.fields.insert("attempt".to_string(), value);
                }
            },
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}

/// Writes one [`LogLine`] per event.
pub(crate) struct JsonLayer<W> {
    service: String,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub(crate) fn new(service: String, make_writer: W) -> Self {
        Self {
            service,
            make_writer,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        attrs.record(&mut visitor);
        if visitor.request.is_empty() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.request);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        values.record(&mut visitor);
        if visitor.request.is_empty() {
            return;
        }
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<RequestContext>() {
            Some(existing) => existing.update(visitor.request),
            None => extensions.insert(visitor.request),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let mut span_name = None;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                span_name.get_or_insert_with(|| span.name().to_string());
                if let Some(outer) = span.extensions().get::<RequestContext>() {
                    visitor.request.inherit(outer);
                }
            }
        }

        let metadata = event.metadata();
        let line = LogLine {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: level_name(*metadata.level()),
            service: self.service.clone(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            request: visitor.request,
            error: visitor.error,
            span: span_name,
            fields: visitor.fields,
        };

        if let Ok(json) = serde_json::to_string(&line) {
            let mut writer = self.make_writer.make_writer();
            let _ = writeln!(writer, "{}", json);
        }
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARN",
        Level::ERROR => "ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl BufferWriter {
        fn lines(&self) -> Vec<Value> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    impl std::io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<Value> {
        let buffer = BufferWriter::default();
        let subscriber = tracing_subscriber::registry()
            .with(JsonLayer::new("request-queue".to_string(), buffer.clone()));
        tracing::subscriber::with_default(subscriber, f);
        buffer.lines()
    }

    #[test]
    fn request_fields_are_lifted_to_top_level() {
        let lines = capture(|| {
            tracing::warn!(
                request_id = %"7f1c",
                command = "ReconnectApp",
                attempt = 3u32,
                delay_ms = 4000u64,
                error = %"HTTP 503",
                "Send failed, retrying"
            );
        });

        let line = &lines[0];
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["service"], "request-queue");
        assert_eq!(line["message"], "Send failed, retrying");
        assert_eq!(line["request_id"], "7f1c");
        assert_eq!(line["command"], "ReconnectApp");
        assert_eq!(line["attempt"], 3);
        assert_eq!(line["error"], "HTTP 503");
        assert_eq!(line["fields"], serde_json::json!({"delay_ms": 4000}));
    }

    #[test]
    fn events_inherit_request_context_from_spans() {
        let lines = capture(|| {
            let span = tracing::info_span!("send", request_id = "7f1c", command = "OpenReport");
            let _guard = span.enter();
            tracing::debug!(status = 429u64, "Request rejected");
            tracing::debug!(command = "AddComment", "Overrides the span");
        });

        assert_eq!(lines[0]["request_id"], "7f1c");
        assert_eq!(lines[0]["command"], "OpenReport");
        assert_eq!(lines[0]["span"], "send");
        assert_eq!(lines[0]["fields"]["status"], 429);
        assert_eq!(lines[1]["command"], "AddComment");
        assert_eq!(lines[1]["request_id"], "7f1c");
    }

    #[test]
    fn plain_events_carry_no_request_keys() {
        let lines = capture(|| {
            tracing::info!("Queue paused");
        });

        let object = lines[0].as_object().unwrap();
        assert!(!object.contains_key("request_id"));
        assert!(!object.contains_key("attempt"));
        assert!(!object.contains_key("fields"));
        assert!(!object.contains_key("span"));
    }

    #[test]
    fn recorded_span_fields_update_context() {
        let lines = capture(|| {
            let span = tracing::info_span!(
                "send",
                request_id = "7f1c",
                attempt = tracing::field::Empty
            );
            let _guard = span.enter();
            span.record("attempt", 2u64);
            tracing::info!("Request succeeded");
        });

        assert_eq!(lines[0]["request_id"], "7f1c");
        assert_eq!(lines[0]["attempt"], 2);
    }
}
