use std::str::FromStr;
use std::sync::Arc;

use domain::error::{PipelineError, PipelineResult};
use domain::models::{ChatMessage, KeywordQueryResult, RetrievedSnippet};
use domain::ports::{ChatModel, EmbeddingModel, VectorIndex};
use futures::future::join_all;
use shared::types::Result;

/// Neighbors requested per index query.
const TOP_K: usize = 5;
/// Hard cap on extracted keyword terms.
const MAX_KEYWORDS: usize = 5;

const KEYWORD_PROMPT: &str = "Extract the most important keyword terms from the \
following text for a reference lookup. Return at most 5 terms as a single \
comma-separated list and nothing else.";

/// How context is looked up for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Embed the whole transcript once and query the index once.
    Direct,
    /// Extract keywords, then embed and query per keyword.
    Keyword,
}

impl FromStr for RetrievalStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(RetrievalStrategy::Direct),
            "keyword" => Ok(RetrievalStrategy::Keyword),
            other => Err(anyhow::anyhow!("unknown retrieval strategy: {other}")),
        }
    }
}

/// What happens when one keyword's lookup fails. The source revisions
/// disagreed, so both behaviors are supported and the choice is
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordFailurePolicy {
    /// Any failed keyword fails the whole request.
    Abort,
    /// Failed keywords are dropped; the request fails only when every
    /// keyword failed.
    Skip,
}

impl FromStr for KeywordFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "abort" => Ok(KeywordFailurePolicy::Abort),
            "skip" => Ok(KeywordFailurePolicy::Skip),
            other => Err(anyhow::anyhow!("unknown keyword failure policy: {other}")),
        }
    }
}

/// Context produced by a retrieval run. Keyword results stay separate,
/// in extraction order, until the digest step combines them.
#[derive(Debug)]
pub enum RetrievedContext {
    Direct(Vec<RetrievedSnippet>),
    Keyword(Vec<KeywordQueryResult>),
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    chat: Arc<dyn ChatModel>,
    strategy: RetrievalStrategy,
    policy: KeywordFailurePolicy,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        strategy: RetrievalStrategy,
        policy: KeywordFailurePolicy,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            strategy,
            policy,
        }
    }

    pub async fn retrieve(&self, transcript: &str) -> PipelineResult<RetrievedContext> {
        match self.strategy {
            RetrievalStrategy::Direct => {
                let snippets = self
                    .lookup(transcript)
                    .await
                    .map_err(PipelineError::Retrieval)?;
                Ok(RetrievedContext::Direct(snippets))
            }
            RetrievalStrategy::Keyword => {
                let keywords = self
                    .extract_keywords(transcript)
                    .await
                    .map_err(PipelineError::Retrieval)?;
                tracing::debug!(count = keywords.len(), "extracted keywords");
                let results = self.query_keywords(keywords).await?;
                Ok(RetrievedContext::Keyword(results))
            }
        }
    }

    /// One digest call over all keyword results, serialized into a single
    /// prompt. No chunking regardless of size.
    pub async fn digest(&self, results: &[KeywordQueryResult]) -> PipelineResult<String> {
        let mut findings = String::new();
        for result in results {
            findings.push_str(&format!("Keyword: {}\n", result.keyword));
            for snippet in &result.snippets {
                findings.push_str(&format!("- {}\n", snippet.text));
            }
        }
        let messages = [ChatMessage::user(format!(
            "Summarize the following reference findings into a short digest a \
voice assistant can lean on while answering. Plain text only.\n\n{findings}"
        ))];
        let digest = self
            .chat
            .complete(&messages)
            .await
            .map_err(PipelineError::Synthesis)?;
        let digest = digest.trim().to_string();
        if digest.is_empty() {
            return Err(PipelineError::Synthesis(anyhow::anyhow!(
                "digest model returned empty text"
            )));
        }
        Ok(digest)
    }

    async fn lookup(&self, text: &str) -> Result<Vec<RetrievedSnippet>> {
        let vector = self.embedder.embed(text).await?;
        self.index.query(&vector, TOP_K).await
    }

    async fn extract_keywords(&self, transcript: &str) -> Result<Vec<String>> {
        let messages = [
            ChatMessage::system(KEYWORD_PROMPT),
            ChatMessage::user(transcript),
        ];
        let raw = self.chat.complete(&messages).await?;
        Ok(parse_keywords(&raw))
    }

    /// Fan out one lookup per keyword and collect results back in keyword
    /// order, whatever order the calls complete in.
    async fn query_keywords(
        &self,
        keywords: Vec<String>,
    ) -> PipelineResult<Vec<KeywordQueryResult>> {
        let total = keywords.len();
        let lookups = keywords.into_iter().map(|keyword| async move {
            let snippets = self.lookup(&keyword).await?;
            Ok(KeywordQueryResult { keyword, snippets }) as Result<KeywordQueryResult>
        });
        let outcomes = join_all(lookups).await;

        let mut results = Vec::with_capacity(total);
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => match self.policy {
                    KeywordFailurePolicy::Abort => return Err(PipelineError::Retrieval(err)),
                    KeywordFailurePolicy::Skip => {
                        tracing::warn!(error = %err, "keyword lookup failed, skipping")
                    }
                },
            }
        }
        if results.is_empty() && total > 0 {
            return Err(PipelineError::Retrieval(anyhow::anyhow!(
                "all {total} keyword lookups failed"
            )));
        }
        Ok(results)
    }
}

/// Parse the model's delimited keyword list: comma-separated, trimmed,
/// empties dropped, capped at [`MAX_KEYWORDS`] in the order given.
fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|term| term.trim().trim_matches('"').to_string())
        .filter(|term| !term.is_empty())
        .take(MAX_KEYWORDS)
        .collect()
}
