use thiserror::Error;

/// Classified pipeline failure. Every variant is terminal for the request:
/// nothing is retried and no partial response is ever produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Audio transcribed to an empty string, or the transcription call
    /// failed. An empty transcript is taken to mean silence.
    #[error("no transcript")]
    InvalidAudio,

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("context synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),

    #[error("completion failed: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("voice synthesis failed: {0}")]
    VoiceSynthesis(#[source] anyhow::Error),
}

impl PipelineError {
    /// Stage label used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "decode",
            PipelineError::InvalidAudio => "transcribe",
            PipelineError::Retrieval(_) => "retrieve",
            PipelineError::Synthesis(_) => "synthesize",
            PipelineError::Completion(_) => "respond",
            PipelineError::VoiceSynthesis(_) => "voice",
        }
    }

    /// Whether the caller is at fault (maps to HTTP 400) as opposed to a
    /// downstream service (HTTP 500).
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidRequest(_) | PipelineError::InvalidAudio
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
