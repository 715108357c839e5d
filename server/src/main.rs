use std::sync::Arc;

use application::assistant_service::AssistantService;
use application::prompt::DEFAULT_PERSONA;
use application::retrieval_service::{KeywordFailurePolicy, RetrievalService, RetrievalStrategy};
use infrastructure::config::Config;
use infrastructure::openai_client::OpenAiClient;
use infrastructure::vector_index::VectorIndexClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let strategy: RetrievalStrategy = config.retrieval_strategy.parse()?;
    let policy: KeywordFailurePolicy = config.keyword_failure_policy.parse()?;

    // Stateless client handles, built once and shared across requests.
    let model_client = Arc::new(OpenAiClient::new(&config)?);
    let index_client = Arc::new(VectorIndexClient::new(&config)?);

    let retrieval = RetrievalService::new(
        model_client.clone(),
        index_client,
        model_client.clone(),
        strategy,
        policy,
    );
    let persona = config
        .persona
        .clone()
        .unwrap_or_else(|| DEFAULT_PERSONA.to_string());
    let service = Arc::new(AssistantService::new(
        model_client.clone(),
        model_client.clone(),
        model_client,
        retrieval,
        persona,
    ));

    let app = presentation::http::router(service);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, strategy = %config.retrieval_strategy, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
