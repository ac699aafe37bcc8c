use crate::config::ValidationError;
use std::io;

/// Errors that stop the service from starting or serving.
#[derive(thiserror::Error, Debug)]
pub enum VdcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("could not connect to dal at {address}: {source}")]
    DalConnect {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// Reasons a DAL query did not produce a usable answer.
///
/// None of these reach the HTTP caller; they are logged and the mock payload is served.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("{}: {}", .0.code(), .0.message())]
    Transport(#[from] tonic::Status),

    #[error("result has no column {0:?}")]
    MissingColumn(&'static str),

    #[error("column {0:?} has no values")]
    EmptyColumn(&'static str),
}

impl UpstreamError {
    /// Short tag for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Transport(_) => "transport",
            UpstreamError::MissingColumn(_) | UpstreamError::EmptyColumn(_) => "malformed",
        }
    }
}
