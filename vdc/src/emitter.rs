//! Log and trace side channels.
//!
//! Every event is printed to stdout. When a collector is configured the event is also
//! POSTed to it as JSON; delivery failures are dropped without a trace.

use crate::config::Config;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

pub const TRACE_ID_HEADER: &str = "X-B3-TraceId";
pub const SPAN_ID_HEADER: &str = "X-B3-SpanId";

/// Operation name attached to every trace event this service emits.
pub const OPERATION: &str = "vdc-processing";

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct LogMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceMessage {
    pub trace_id: String,
    pub parent_span_id: String,
    pub span_id: String,
    pub operation: String,
    pub message: String,
}

impl TraceMessage {
    /// The caller's span becomes our parent. Missing or non-ASCII headers become empty ids.
    pub fn from_headers(headers: &HeaderMap, message: &str) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        TraceMessage {
            trace_id: header(TRACE_ID_HEADER),
            parent_span_id: header(SPAN_ID_HEADER),
            span_id: String::new(),
            operation: OPERATION.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Clone)]
struct Collector {
    client: reqwest::Client,
    base_url: String,
}

impl Collector {
    async fn post<T: Serialize>(&self, path: &str, body: &T) {
        let url = format!("{}{path}", self.base_url);
        let _ = self.client.post(url).json(body).send().await;
    }
}

#[derive(Clone)]
pub struct Emitter {
    collector: Option<Collector>,
    trace: bool,
}

impl Emitter {
    pub fn new(config: &Config) -> Self {
        let collector = config.log_endpoint().map(|base_url| Collector {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        });

        Emitter {
            collector,
            trace: config.trace_enabled(),
        }
    }

    pub fn console_only() -> Self {
        Emitter {
            collector: None,
            trace: false,
        }
    }

    pub async fn log(&self, msg: &str) {
        if let Some(collector) = &self.collector {
            let body = LogMessage {
                value: msg.to_string(),
            };
            collector.post("/v1/log", &body).await;
        }

        println!("[Log] {msg}");
    }

    /// Opens a traced operation.
    pub async fn trace(&self, headers: &HeaderMap, msg: &str) {
        self.send_trace("/v1/trace", headers, msg).await;
        println!("[Trace] {msg}");
    }

    /// Marks the end of a traced operation.
    pub async fn trace_close(&self, headers: &HeaderMap, msg: &str) {
        self.send_trace("/v1/close", headers, msg).await;
        println!("[Close] {msg}");
    }

    async fn send_trace(&self, path: &str, headers: &HeaderMap, msg: &str) {
        if !self.trace {
            return;
        }
        if let Some(collector) = &self.collector {
            collector
                .post(path, &TraceMessage::from_headers(headers, msg))
                .await;
        }
    }
}
