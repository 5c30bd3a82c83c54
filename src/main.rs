mod board;
mod db;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use board::{BoardEngine, PgBoardStore};
use db::{create_pool, run_migrations};
use routes::create_router;
use state::{AppState, Config};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kanban_board=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    tracing::info!("Connecting to database...");
    let db = create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    run_migrations(&db).await?;

    // Board move event broadcaster (feeds the SSE streams)
    let (board_tx, _) = broadcast::channel(100);

    let store = PgBoardStore::new(
        db.clone(),
        Duration::from_millis(config.store_timeout_ms),
    );
    let engine = BoardEngine::new(store, config.default_board_title.clone());

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        board_tx: board_tx.clone(),
        engine,
    };

    let app = create_router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
