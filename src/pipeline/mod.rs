pub mod analysis;
pub mod batch;
pub mod cache;
pub mod complaint;
pub mod extract;
pub mod normalize;
pub mod ollama;
pub mod prompt;
pub mod retry;

pub use analysis::*;
pub use batch::*;
pub use cache::*;
pub use complaint::*;
pub use extract::*;
pub use normalize::*;
pub use ollama::*;
pub use prompt::*;
pub use retry::*;

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Failures of a single model round-trip.
///
/// `Connection`/`Timeout`/`Http`/`Backend` are transport or backend faults
/// and are retried by the orchestrator; `Decode` and `InvalidResponse` are
/// surfaced immediately so the caller can apply its own fallback.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("model backend is not reachable at {0}")]
    Connection(String),

    #[error("model request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("model backend returned error (status {status}): {body}")]
    Backend { status: u16, body: String },

    #[error("model reply could not be decoded: {0}")]
    Decode(String),

    #[error("model reply is missing required data: {0}")]
    InvalidResponse(String),

    #[error("caller deadline expired before the model answered")]
    DeadlineExceeded,
}

impl LlmError {
    /// Whether the orchestrator's retry budget applies to this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Http(_) | Self::Backend { .. }
        )
    }
}

/// Failures of a whole pipeline call.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing required field: {0}")]
    Validation(&'static str),

    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("model error: {0}")]
    Llm(#[from] LlmError),
}
