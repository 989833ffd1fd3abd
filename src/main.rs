use anyhow::Result;
use pitchroom::providers::{ChatCompletionsClient, ConfigKeyring, HttpSpeechToText};
use pitchroom::{create_router, AppState, Config, Orchestrator, Repositories};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitchroom=info,tower_http=info".into()),
        )
        .init();

    let config = Config::load("pitchroom").unwrap_or_default();

    info!("🎙️  Pitchroom v0.1.0 - Live pitch meeting assistant");

    // Shared provider clients, keyed per tenant through the keyring.
    let keyring: Arc<ConfigKeyring> =
        Arc::new(ConfigKeyring::new(config.providers.api_key.clone()));
    let stt = Arc::new(HttpSpeechToText::new(
        &config.providers.base_url,
        keyring.clone(),
    ));
    let generator = Arc::new(ChatCompletionsClient::new(
        &config.providers.base_url,
        &config.providers.chat_model,
        keyring,
    ));

    let repos = Repositories::in_memory();
    let orchestrator = Orchestrator::new(
        repos,
        stt,
        generator,
        config.audio.clone(),
        config.session.clone(),
        config.providers.clone(),
    );

    let app_state = AppState::new(Arc::clone(&orchestrator));
    let app = create_router(app_state);

    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    info!("🌐 Starting server on http://{}", addr);
    info!("📋 API endpoints:");
    info!("   GET    /ws                       (attach channel)");
    info!("   POST   /sessions/start");
    info!("   POST   /sessions/:id/stop");
    info!("   GET    /sessions/:id");
    info!("   GET    /sessions/:id/transcript");
    info!("   POST   /sessions/:id/questions/:qid/answered");
    info!("   DELETE /sessions/:id/questions/:qid");
    info!("   GET    /health");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(orchestrator))
        .await?;

    Ok(())
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received; letting in-flight finalization settle");
    orchestrator.shutdown();
}
