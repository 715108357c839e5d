//! Interfaces over the external services the pipeline orchestrates.
//! Implementations live in `infrastructure`; tests substitute in-memory
//! fakes. Every implementation must be stateless per call so one handle
//! can be shared read-only across concurrent requests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use shared::types::Result;

use crate::models::{AudioUpload, ChatMessage, RetrievedSnippet};

/// Raw PCM bytes from the text-to-speech service, forwarded without
/// re-encoding. f32le, 24 kHz, mono.
pub type VoiceStream = BoxStream<'static, Result<Bytes>>;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Audio bytes in, recognized text out. The payload is opaque here.
    async fn transcribe(&self, audio: &AudioUpload) -> Result<String>;
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbors for `vector`, ranked by descending similarity.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedSnippet>>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion call; returns the first choice's message text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<VoiceStream>;
}
