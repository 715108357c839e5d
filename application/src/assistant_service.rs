use std::sync::Arc;

use domain::error::{PipelineError, PipelineResult};
use domain::models::{AssistantInput, AssistantReply, AssistantRequest, ChatMessage};
use domain::ports::{ChatModel, SpeechToText, TextToSpeech, VoiceStream};

use crate::prompt;
use crate::retrieval_service::{RetrievalService, RetrievedContext};

/// The whole request pipeline: transcribe, retrieve, respond. Holds only
/// shared stateless client handles, so one instance serves every request.
pub struct AssistantService {
    stt: Arc<dyn SpeechToText>,
    chat: Arc<dyn ChatModel>,
    tts: Arc<dyn TextToSpeech>,
    retrieval: RetrievalService,
    persona: String,
}

impl AssistantService {
    pub fn new(
        stt: Arc<dyn SpeechToText>,
        chat: Arc<dyn ChatModel>,
        tts: Arc<dyn TextToSpeech>,
        retrieval: RetrievalService,
        persona: String,
    ) -> Self {
        Self {
            stt,
            chat,
            tts,
            retrieval,
            persona,
        }
    }

    /// Run the text pipeline start to finish. Control flows strictly
    /// downstream; the first classified failure aborts the request.
    pub async fn handle(&self, request: AssistantRequest) -> PipelineResult<AssistantReply> {
        let transcript = self.transcribe(&request.input).await?;
        let context = self.retrieval.retrieve(&transcript).await?;
        let context_text = match context {
            RetrievedContext::Direct(snippets) => {
                if snippets.is_empty() {
                    None
                } else {
                    let joined = snippets
                        .iter()
                        .map(|s| s.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                    Some(joined)
                }
            }
            RetrievedContext::Keyword(results) => {
                if results.is_empty() {
                    None
                } else {
                    Some(self.retrieval.digest(&results).await?)
                }
            }
        };

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(prompt::persona_message(&self.persona, &request.caller));
        messages.extend(request.history.iter().map(ChatMessage::from));
        messages.push(prompt::user_message(&transcript, context_text.as_deref()));

        let reply = self
            .chat
            .complete(&messages)
            .await
            .map_err(PipelineError::Completion)?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(PipelineError::Completion(anyhow::anyhow!(
                "model returned empty reply"
            )));
        }
        Ok(AssistantReply { transcript, reply })
    }

    /// Synthesize the reply into a raw PCM stream. Called only by the
    /// voice variant, after [`handle`] has already succeeded.
    pub async fn voice(&self, reply: &str) -> PipelineResult<VoiceStream> {
        self.tts
            .synthesize(reply)
            .await
            .map_err(PipelineError::VoiceSynthesis)
    }

    /// Non-empty text passes through verbatim; a transcript that trims to
    /// empty fails the request whichever form it arrived in. Audio goes to
    /// the external recognizer, where an empty trimmed result is treated as
    /// silence, not a transient fault, so there is no retry.
    async fn transcribe(&self, input: &AssistantInput) -> PipelineResult<String> {
        match input {
            AssistantInput::Text(text) => {
                if text.trim().is_empty() {
                    return Err(PipelineError::InvalidRequest(
                        "empty input text".to_string(),
                    ));
                }
                Ok(text.clone())
            }
            AssistantInput::Audio(upload) => {
                let text = self
                    .stt
                    .transcribe(upload)
                    .await
                    .map_err(|err| {
                        tracing::warn!(error = %err, "transcription call failed");
                        PipelineError::InvalidAudio
                    })?
                    .trim()
                    .to_string();
                if text.is_empty() {
                    return Err(PipelineError::InvalidAudio);
                }
                Ok(text)
            }
        }
    }
}
