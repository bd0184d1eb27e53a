use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use supportdesk_agent::llm::{EmbeddingClient, LlmClient, OpenAiClient};
use supportdesk_agent::retriever::{KnowledgeIndex, KnowledgeRetriever};
use supportdesk_agent::runtime::ConversationOrchestrator;
use supportdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use supportdesk_core::domain::kb::builtin_knowledge_base;
use supportdesk_db::repositories::{SqlConversationLog, SqlOrderLedger};
use supportdesk_db::{connect_with_settings, migrations, DbPool, EscalationWorkflow, MetricsAggregator};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api_state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    // One provider client serves both completion and embedding; when it is
    // absent the pipeline runs in permanent degraded mode.
    let provider = OpenAiClient::from_config(&config.llm).map(Arc::new);
    let llm: Option<Arc<dyn LlmClient>> =
        provider.clone().map(|client| client as Arc<dyn LlmClient>);
    let embedder: Option<Arc<dyn EmbeddingClient>> =
        provider.map(|client| client as Arc<dyn EmbeddingClient>);

    // The KB index is built once here and read-only afterward.
    let index = match &embedder {
        Some(embedder) => {
            Arc::new(KnowledgeIndex::build(builtin_knowledge_base(), embedder.as_ref()).await)
        }
        None => Arc::new(KnowledgeIndex::without_embeddings(builtin_knowledge_base())),
    };
    info!(
        event_name = "system.bootstrap.kb_indexed",
        correlation_id = "bootstrap",
        entries = index.entries().len(),
        embedded = index.has_embeddings(),
        "knowledge base indexed"
    );

    let orchestrator = Arc::new(ConversationOrchestrator::new(
        KnowledgeRetriever::new(index, embedder),
        llm,
        Arc::new(SqlOrderLedger::new(db_pool.clone())),
        Arc::new(SqlConversationLog::new(db_pool.clone())),
        Duration::from_secs(config.llm.timeout_secs),
    ));

    let api_state = ApiState::new(
        orchestrator,
        Arc::new(SqlOrderLedger::new(db_pool.clone())),
        Arc::new(EscalationWorkflow::new(db_pool.clone())),
        Arc::new(SqlConversationLog::new(db_pool.clone())),
        Arc::new(MetricsAggregator::new(db_pool.clone())),
        config.auth.clone(),
    );

    Ok(Application { config, db_pool, api_state })
}
