use thiserror::Error;

use mesh_format::ParseError;

/// Failure taxonomy for the estimation pipeline. Only
/// [`EstimateError::MalformedInput`] and
/// [`EstimateError::InvalidParameters`] can reach callers of the
/// orchestrator; everything else is recovered internally by falling to
/// a lower tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),
    #[error("input truncated after {triangles_read} triangles")]
    TruncatedInput { triangles_read: u32 },
    #[error("degenerate geometry, computed volume is zero or negative")]
    DegenerateGeometry,
    #[error("remote estimator unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),
}

impl From<ParseError> for EstimateError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Malformed(reason) => EstimateError::MalformedInput(reason),
            ParseError::Truncated { triangles_read, .. } => {
                EstimateError::TruncatedInput { triangles_read }
            }
            ParseError::UnsupportedFormat(_) => {
                EstimateError::MalformedInput("unsupported mesh format")
            }
        }
    }
}
