use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use uellogent::adapters::api_handler::{AdminKey, AppState};
use uellogent::adapters::downstream::HttpDownstreamClient;
use uellogent::adapters::health_handler::HealthHandler;
use uellogent::adapters::rate_limit::create_limiter;
use uellogent::adapters::session_registry::{AgentFactory, SessionRegistry};
use uellogent::adapters::tool_handler::SupportToolSet;
use uellogent::agents::domain::{MessageLog, ToolPort};
use uellogent::agents::llm::create_provider;
use uellogent::agents::memory::create_store;
use uellogent::agents::{QueryAgent, SupportAgent};
use uellogent::cli::Cli;
use uellogent::config::Settings;
use uellogent::persistence::open_message_log;
use uellogent::retrieval::{
    create_index, HttpLoader, IndexRetriever, Ingestor, OpenAiEmbedder, TextSplitter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,uellogent=debug")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    info!("Starting UelloGent Agent Server on {}:{}", host, port);

    // Audit trail
    let sql_log = open_message_log(&settings.audit).await?;
    let audit_pool = sql_log.connection_pool().clone();
    let message_log: Arc<dyn MessageLog> = Arc::new(sql_log);

    // Support agent sessions
    let support_llm = create_provider(&settings.support_agent.llm)?;
    let tools: Arc<dyn ToolPort> = Arc::new(SupportToolSet::new(Arc::new(
        HttpDownstreamClient::new(settings.tools.clone())?,
    )));

    let factory: AgentFactory<SupportAgent> = {
        let config = settings.support_agent.clone();
        let log = message_log.clone();
        Arc::new(move || {
            Ok(SupportAgent::new(
                &config,
                support_llm.clone(),
                tools.clone(),
                log.clone(),
            ))
        })
    };
    let sessions = Arc::new(SessionRegistry::new(settings.session.timeout(), factory));
    let _sweeper = sessions.spawn_sweeper(settings.session.sweep_interval());

    // Query agent and its index
    let embedder = Arc::new(OpenAiEmbedder::new(&settings.embeddings)?);
    let index = create_index(&settings.vector_index)?;
    let retriever = Arc::new(IndexRetriever::new(embedder.clone(), index.clone()));
    let query_agent = Arc::new(QueryAgent::new(
        settings.query_agent.clone(),
        create_provider(&settings.query_agent.llm)?,
        retriever,
        message_log.clone(),
    ));
    let history = create_store(&settings.history, settings.session.timeout()).await?;

    let ingestor = Arc::new(Ingestor::new(
        Arc::new(HttpLoader::new(
            &settings.ingest.user_agent,
            settings.ingest.timeout_secs,
        )?),
        TextSplitter::new(settings.ingest.chunk_size, settings.ingest.chunk_overlap),
        embedder,
        index,
    ));

    let admin_key = AdminKey::from_env(&settings.admin.key_env);
    if !admin_key.is_configured() {
        warn!(
            "{} is not set; admin endpoints will reject every request",
            settings.admin.key_env
        );
    }

    let state = AppState {
        sessions: sessions.clone(),
        query_agent,
        history,
        message_log,
        ingestor,
        admin_key,
    };
    let health_handler = Arc::new(HealthHandler::new(sessions, Some(audit_pool)));
    let rate_limiter = settings
        .rate_limit
        .enabled
        .then(|| create_limiter(settings.rate_limit.requests_per_day));
    let _pruner = rate_limiter
        .as_ref()
        .map(|limiter| limiter.spawn_pruner(settings.session.sweep_interval()));

    let app = uellogent::create_app(state, health_handler, rate_limiter);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
