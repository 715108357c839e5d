//! Client for the Pinecone-compatible vector index. One query per call,
//! metadata requested, raw vectors left out of the response.

use std::sync::Arc;

use async_trait::async_trait;
use domain::models::RetrievedSnippet;
use domain::ports::VectorIndex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::types::Result;

use crate::config::Config;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<MatchMetadata>,
}

#[derive(Deserialize)]
struct MatchMetadata {
    text: Option<String>,
}

#[derive(Clone)]
pub struct VectorIndexClient {
    client: Arc<Client>,
    url: String,
    api_key: String,
}

impl VectorIndexClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
            url: config.vector_index_url.clone(),
            api_key: config.vector_index_api_key.clone(),
        })
    }
}

#[async_trait]
impl VectorIndex for VectorIndexClient {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedSnippet>> {
        let url = format!("{}/query", self.url);
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("vector index error {status}: {body}"));
        }
        let parsed: QueryResponse = response.json().await?;
        // Index return order (descending similarity) is kept as-is.
        let snippets = parsed
            .matches
            .into_iter()
            .map(|m| RetrievedSnippet {
                id: m.id,
                score: m.score,
                text: m.metadata.and_then(|meta| meta.text).unwrap_or_default(),
            })
            .collect();
        Ok(snippets)
    }
}
