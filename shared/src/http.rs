use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// Time a client has to send a complete HTTP/1 request head.
    pub header_read: Duration,
    /// Time after which the connection is closed gracefully. A request in flight at that
    /// point is still answered.
    pub keep_alive: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        ConnectionTimeouts {
            header_read: Duration::from_secs(15),
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Binds `host:port` and serves `service` until `shutdown` resolves.
pub async fn run_http_service<S, E, F>(
    host: &str,
    port: u16,
    service: S,
    shutdown: F,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    serve(listener, service, shutdown).await
}

/// Accept loop over an already bound listener, using the default [`ConnectionTimeouts`].
pub async fn serve<S, E, F>(listener: TcpListener, service: S, shutdown: F) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    serve_with_timeouts(listener, service, ConnectionTimeouts::default(), shutdown).await
}

/// Accept loop over an already bound listener.
///
/// Returns once `shutdown` resolves. Connections that were already accepted keep
/// running on their own tasks; the service is dropped once the last of them is done.
pub async fn serve_with_timeouts<S, E, F>(
    listener: TcpListener,
    service: S,
    timeouts: ConnectionTimeouts,
    shutdown: F,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    let service_arc = Arc::new(service);
    tokio::pin!(shutdown);

    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.header_read);

    loop {
        let (stream, _peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            () = &mut shutdown => {
                tracing::info!("No longer accepting connections");
                return Ok(());
            }
        };
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();
        let builder = builder.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            let conn = builder.serve_connection(io, svc);
            tokio::pin!(conn);

            let result = match tokio::time::timeout(timeouts.keep_alive, conn.as_mut()).await {
                Ok(result) => result,
                Err(_) => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(error = %e, "Connection closed with error");
            }
        });
    }
}

/// Wraps a complete in-memory body.
pub fn full_body<E: 'static>(body: impl Into<Bytes>) -> BoxBody<Bytes, E> {
    Full::new(body.into()).map_err(|e| match e {}).boxed()
}
