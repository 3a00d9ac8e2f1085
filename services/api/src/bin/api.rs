//! services/api/src/bin/api.rs

use api_lib::{
    adapters::OpenAiModelProvider,
    config::Config,
    error::ApiError,
    web::{create_router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    Router,
};
use lesson_gen_core::flows::{GenerateLessonFlow, ImproveLessonFlow};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Model Provider ---
    let mut openai_config = OpenAIConfig::new().with_api_key(&config.provider.api_key);
    if let Some(api_base) = &config.provider.api_base {
        info!("Using model provider endpoint {}", api_base);
        openai_config = openai_config.with_api_base(api_base);
    }
    let openai_client = Client::with_config(openai_config);

    let lesson_provider = Arc::new(OpenAiModelProvider::new(
        openai_client.clone(),
        config.lesson_model.clone(),
    ));
    let improve_provider = Arc::new(OpenAiModelProvider::new(
        openai_client,
        config.improve_model.clone(),
    ));

    // --- 3. Build the Prompt Flows and Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(GenerateLessonFlow::new(lesson_provider)),
        Arc::new(ImproveLessonFlow::new(improve_provider)),
    ));

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(create_router(app_state, cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
