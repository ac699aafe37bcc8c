//! Client for the DAL query service.
//!
//! Message types mirror `proto/dal.proto`. They are declared by hand with the prost
//! derives so the build does not depend on `protoc`.

use crate::config::dal_uri;
use crate::errors::{UpstreamError, VdcError};
use crate::upstream::{QueryResult, QueryService};
use async_trait::async_trait;
use http::uri::PathAndQuery;
use std::collections::HashMap;
use std::time::Duration;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};

const QUERY_PATH: &str = "/dal.Dal/Query";

/// Only bounds establishing the connection at startup. Queries have no deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryRequest {
    #[prost(string, tag = "1")]
    pub sql: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryReply {
    #[prost(message, optional, tag = "1")]
    pub result: Option<ResultSet>,
    #[prost(message, optional, tag = "2")]
    pub error: Option<DalError>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResultSet {
    #[prost(map = "string, message", tag = "1")]
    pub result: HashMap<String, Values>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Values {
    #[prost(string, repeated, tag = "1")]
    pub value: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DalError {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl From<QueryReply> for QueryResult {
    fn from(reply: QueryReply) -> Self {
        if let Some(error) = reply.error {
            return QueryResult::Error(error.message);
        }

        let columns = reply
            .result
            .map(|set| {
                set.result
                    .into_iter()
                    .map(|(column, values)| (column, values.value))
                    .collect()
            })
            .unwrap_or_default();

        QueryResult::Rows(columns)
    }
}

/// gRPC client for `dal.Dal`. Cloning is cheap and shares the underlying channel.
#[derive(Clone)]
pub struct DalClient {
    inner: tonic::client::Grpc<Channel>,
}

impl DalClient {
    pub fn new(channel: Channel) -> Self {
        DalClient {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Dials the DAL and waits for the connection to be established.
    pub async fn connect(address: &str) -> Result<Self, VdcError> {
        let connect_error = |source: tonic::transport::Error| VdcError::DalConnect {
            address: address.to_string(),
            source,
        };

        let channel = Endpoint::from_shared(dal_uri(address))
            .map_err(connect_error)?
            .connect_timeout(CONNECT_TIMEOUT)
            .connect()
            .await
            .map_err(connect_error)?;

        Ok(DalClient::new(channel))
    }

    pub async fn query(&mut self, request: QueryRequest) -> Result<QueryReply, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("dal channel not ready: {e}")))?;

        let codec: ProstCodec<QueryRequest, QueryReply> = ProstCodec::default();
        let path = PathAndQuery::from_static(QUERY_PATH);
        let response = self
            .inner
            .unary(tonic::Request::new(request), path, codec)
            .await?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl QueryService for DalClient {
    async fn execute(&self, sql: &str) -> Result<QueryResult, UpstreamError> {
        let mut client = self.clone();
        let reply = client
            .query(QueryRequest {
                sql: sql.to_string(),
            })
            .await?;

        Ok(reply.into())
    }
}
