use anyhow::Context;
use dotenvy::dotenv;
use shared::types::Result;
use std::env;
use std::time::Duration;

pub struct Config {
    pub bind_addr: String,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub transcription_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub vector_index_url: String,
    pub vector_index_api_key: String,
    pub retrieval_strategy: String,
    pub keyword_failure_policy: String,
    pub request_timeout: Duration,
    pub persona: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        let timeout_secs: u64 = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be an integer")?;
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is required")?,
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            transcription_model: env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            tts_model: env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string()),
            tts_voice: env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string()),
            vector_index_url: env::var("VECTOR_INDEX_URL")
                .context("VECTOR_INDEX_URL is required")?,
            vector_index_api_key: env::var("VECTOR_INDEX_API_KEY")
                .context("VECTOR_INDEX_API_KEY is required")?,
            retrieval_strategy: env::var("RETRIEVAL_STRATEGY")
                .unwrap_or_else(|_| "direct".to_string()),
            keyword_failure_policy: env::var("KEYWORD_FAILURE_POLICY")
                .unwrap_or_else(|_| "abort".to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            persona: env::var("PERSONA").ok(),
        })
    }
}
