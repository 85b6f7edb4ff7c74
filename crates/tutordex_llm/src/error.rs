use thiserror::Error;
use tutordex_protocol::ErrorKind;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM circuit breaker is open")]
    CircuitOpen,

    #[error("request to LLM endpoint timed out or failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("LLM response body was empty")]
    EmptyResponse,

    #[error("LLM response was not valid JSON even after repair: {0}")]
    InvalidJson(String),

    #[error("LLM response JSON did not match the expected schema: {0}")]
    SchemaShape(String),
}

impl LlmError {
    /// Project onto the closed error taxonomy persisted with a failed job
    ///.
    pub fn to_error_kind(&self) -> ErrorKind {
        match self {
            LlmError::CircuitOpen => ErrorKind::LlmCircuitOpen,
            LlmError::Network(e) if e.is_timeout() => ErrorKind::LlmNetworkTimeout,
            LlmError::Network(_) => ErrorKind::LlmNetworkTimeout,
            LlmError::Http { status, .. } if *status == 429 || *status >= 500 => ErrorKind::Llm5xx,
            LlmError::Http { .. } => ErrorKind::Llm4xx,
            LlmError::EmptyResponse => ErrorKind::LlmEmptyResponse,
            LlmError::InvalidJson(_) => ErrorKind::LlmInvalidJson,
            LlmError::SchemaShape(_) => ErrorKind::LlmSchemaShape,
        }
    }
}
