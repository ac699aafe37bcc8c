use crate::dal::{QueryReply, QueryRequest};
use crate::errors::UpstreamError;
use crate::upstream::{QueryResult, QueryService};
use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use prost::Message;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
pub struct Received {
    pub path: String,
    pub body: serde_json::Value,
}

/// Log collector stand-in that records every request it gets.
pub struct MockCollector {
    port: u16,
    received: Arc<Mutex<Vec<Received>>>,
}

impl MockCollector {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let sink = sink.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let sink = sink.clone();
                        async move {
                            let path = req.uri().path().to_string();
                            let bytes = req.into_body().collect().await.unwrap().to_bytes();
                            let body = serde_json::from_slice(&bytes)
                                .unwrap_or(serde_json::Value::Null);
                            sink.lock().unwrap().push(Received { path, body });
                            Ok::<_, Infallible>(Response::new(Full::new(Bytes::new())))
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockCollector { port, received }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

/// gRPC stand-in for the DAL. Answers every call with `reply` and records the request
/// path and SQL of each call.
pub struct MockDal {
    port: u16,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockDal {
    pub async fn start(reply: QueryReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let seen = calls.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let seen = seen.clone();
                let reply = reply.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let seen = seen.clone();
                        let reply = reply.clone();
                        async move {
                            let path = req.uri().path().to_string();
                            let bytes = req.into_body().collect().await.unwrap().to_bytes();
                            // Skip the compression flag and length prefix
                            let request = QueryRequest::decode(&bytes[5..]).unwrap();
                            seen.lock().unwrap().push((path, request.sql));

                            let mut trailers = HeaderMap::new();
                            trailers.insert("grpc-status", HeaderValue::from_static("0"));
                            let body = Full::new(grpc_frame(&reply))
                                .with_trailers(async move { Some(Ok(trailers)) });

                            let response = Response::builder()
                                .header("content-type", "application/grpc")
                                .body(body)
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        MockDal { port, calls }
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

fn grpc_frame(message: &impl Message) -> Bytes {
    let encoded = message.encode_to_vec();
    let mut frame = Vec::with_capacity(encoded.len() + 5);
    frame.push(0);
    frame.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
    frame.extend_from_slice(&encoded);
    Bytes::from(frame)
}

pub enum Scripted {
    Rows(HashMap<String, Vec<String>>),
    DalError(String),
    Unavailable,
}

/// Query service that answers every call the same way and remembers the queries.
pub struct FakeQueryService {
    answer: Scripted,
    queries: Mutex<Vec<String>>,
}

impl FakeQueryService {
    pub fn new(answer: Scripted) -> Arc<Self> {
        Arc::new(FakeQueryService {
            answer,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn rows(column: &str, values: &[&str]) -> Arc<Self> {
        Self::new(Scripted::Rows(HashMap::from([(
            column.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        )])))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryService for FakeQueryService {
    async fn execute(&self, sql: &str) -> Result<QueryResult, UpstreamError> {
        self.queries.lock().unwrap().push(sql.to_string());

        match &self.answer {
            Scripted::Rows(columns) => Ok(QueryResult::Rows(columns.clone())),
            Scripted::DalError(message) => Ok(QueryResult::Error(message.clone())),
            Scripted::Unavailable => Err(UpstreamError::Transport(tonic::Status::unavailable(
                "connection refused",
            ))),
        }
    }
}
