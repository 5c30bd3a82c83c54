use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    board::{BoardEngine, MoveOutcome, PgBoardStore},
    db::DbPool,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub board_tx: broadcast::Sender<MoveOutcome>,
    pub engine: BoardEngine<PgBoardStore>,
}

#[derive(Clone)]
pub struct Config {
    pub default_board_title: String,
    pub store_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            default_board_title: std::env::var("DEFAULT_BOARD_TITLE")
                .unwrap_or_else(|_| "My Board".to_string()),
            store_timeout_ms: std::env::var("STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("STORE_TIMEOUT_MS must be a number"),
        }
    }
}
