use crate::emitter::Emitter;
use crate::errors::UpstreamError;
use crate::metrics_defs::{DAL_FALLBACKS, DAL_QUERY_DURATION};
use async_trait::async_trait;
use http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// The only query this service ever issues.
pub const QUERY: &str = "Select * From Messages";

/// Served whenever the DAL is disabled or could not produce an answer.
pub const MOCK_RESPONSE: &str = r#"{"mgs":"Hello World"}"#;

const RESULT_COLUMN: &str = "msg";

#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    /// Column name to the values of that column.
    Rows(HashMap<String, Vec<String>>),
    /// The service answered but reported a failure.
    Error(String),
}

/// A remote service that runs queries.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, UpstreamError>;
}

fn first_value<'a>(
    columns: &'a HashMap<String, Vec<String>>,
    column: &'static str,
) -> Result<&'a str, UpstreamError> {
    columns
        .get(column)
        .ok_or(UpstreamError::MissingColumn(column))?
        .first()
        .map(String::as_str)
        .ok_or(UpstreamError::EmptyColumn(column))
}

/// Answers `/ask` from the DAL, falling back to [`MOCK_RESPONSE`] on any failure.
pub struct Upstream {
    service: Arc<dyn QueryService>,
}

impl Upstream {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Upstream { service }
    }

    /// Returns the JSON body to send. Never fails.
    pub async fn respond(&self, headers: &HeaderMap, emitter: &Emitter) -> String {
        emitter.trace(headers, "vdc-dal-request").await;

        let started = Instant::now();
        let result = self.service.execute(QUERY).await;
        shared::histogram!(DAL_QUERY_DURATION).record(started.elapsed().as_secs_f64());

        emitter.trace(headers, "vdc-dal-response").await;

        match result {
            Err(e) => {
                emitter.log(&format!("failed to call dal {e}")).await;
                fallback(e.kind())
            }
            Ok(QueryResult::Error(message)) => {
                emitter.log(&format!("internal dal error {message}")).await;
                fallback("dal_error")
            }
            Ok(QueryResult::Rows(columns)) => match first_value(&columns, RESULT_COLUMN) {
                Ok(value) => serde_json::json!({ "mgs": value }).to_string(),
                Err(e) => {
                    emitter.log(&format!("malformed dal result: {e}")).await;
                    fallback(e.kind())
                }
            },
        }
    }
}

fn fallback(reason: &'static str) -> String {
    tracing::warn!(reason, "Serving mock response instead of dal result");
    shared::counter!(DAL_FALLBACKS, "reason" => reason).increment(1);
    MOCK_RESPONSE.to_string()
}
