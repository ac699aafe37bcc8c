use crate::config::Config;
use crate::dal::DalClient;
use crate::emitter::Emitter;
use crate::errors::VdcError;
use crate::metrics_defs::REQUESTS;
use crate::upstream::{MOCK_RESPONSE, Upstream};
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use http::{HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use shared::http::full_body;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ResponseBody = BoxBody<Bytes, VdcError>;

pub const ASK_PATH: &str = "/ask";

const NOT_FOUND_BODY: &str = r#"{"msg":"content not found"}"#;
const ALLOW_METHODS: &str = "GET, OPTIONS, HEAD";
const ALLOW_HEADERS: &str =
    "Accept, Content-Type, Content-Length, Accept-Encoding, Authorization, X-DITAS-CALLBACK";
const APPLICATION_JSON: &str = "application/json";

/// Request handling state. Immutable once built and shared by every connection.
pub struct VdcServer {
    emitter: Emitter,
    upstream: Option<Upstream>,
}

impl VdcServer {
    pub fn new(emitter: Emitter, upstream: Option<Upstream>) -> Self {
        VdcServer { emitter, upstream }
    }

    /// Builds the server, connecting to the DAL first when one is configured.
    pub async fn from_config(config: &Config) -> Result<Self, VdcError> {
        let upstream = match config.dal_address() {
            Some(address) => {
                let client = DalClient::connect(address).await?;
                tracing::info!(address, "Connected to dal");
                Some(Upstream::new(Arc::new(client)))
            }
            None => {
                tracing::info!("No dal configured, serving mock data");
                None
            }
        };

        Ok(VdcServer::new(Emitter::new(config), upstream))
    }

    pub async fn handle<B: Body>(&self, req: Request<B>) -> Response<ResponseBody> {
        let line = request_line(&req);

        if req.uri().path() != ASK_PATH {
            shared::counter!(REQUESTS, "route" => "not_found").increment(1);
            self.emitter.log(&line).await;
            return json_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        }
        if req.method() != Method::GET {
            shared::counter!(REQUESTS, "route" => "method_not_allowed").increment(1);
            self.emitter.log(&line).await;
            return empty_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        shared::counter!(REQUESTS, "route" => "ask").increment(1);
        self.emitter.log(&line).await;
        self.ask(req).await
    }

    async fn ask<B: Body>(&self, req: Request<B>) -> Response<ResponseBody> {
        let (parts, body) = req.into_parts();
        self.emitter.trace(&parts.headers, "vdc-request").await;

        // The body is opaque; an unreadable one is logged as empty.
        let data = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        let body_line = format!("- {} ", String::from_utf8_lossy(&data));
        self.emitter.log(&body_line).await;

        let payload = match &self.upstream {
            Some(upstream) => upstream.respond(&parts.headers, &self.emitter).await,
            None => MOCK_RESPONSE.to_string(),
        };

        let mut response = json_response(StatusCode::OK, payload);
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );

        self.emitter.trace_close(&parts.headers, "vdc-request").await;
        response
    }
}

fn request_line<B>(req: &Request<B>) -> String {
    format!("[{}] {}", req.method(), req.uri())
}

fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Hyper entry point wrapping a shared [`VdcServer`].
#[derive(Clone)]
pub struct VdcService {
    server: Arc<VdcServer>,
}

impl VdcService {
    pub fn new(server: VdcServer) -> Self {
        VdcService {
            server: Arc::new(server),
        }
    }
}

impl Service<Request<Incoming>> for VdcService {
    type Response = Response<ResponseBody>;
    type Error = VdcError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let server = self.server.clone();
        Box::pin(async move { Ok(server.handle(req).await) })
    }
}
