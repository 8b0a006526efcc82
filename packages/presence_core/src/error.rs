/// Reasons an inbound relay frame is discarded without touching the presence table.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// The frame is not valid JSON, or a field has the wrong type
    #[error("malformed presence frame: {0}")]
    Parse(#[from] serde_json::Error),

    /// Parsed, but the status is absent or not `"success"`
    #[error("unexpected presence frame (status: {status:?})")]
    UnexpectedFormat { status: Option<String> },

    /// A success frame without a usable source identifier
    #[error("presence frame has no source")]
    MissingSource,
}
