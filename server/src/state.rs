use std::{env, sync::Arc};

use serde::Serialize;

use huddle_core::{config::AppConfig, db::Database, user::UserStore, workspace::WorkspaceStore};

/// Process-wide application state. Built once at startup and injected into
/// handlers through axum's `State`; there are no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_store: UserStore,
    pub workspace_store: WorkspaceStore,
    pub metadata: ServerMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub message: String,
}

impl ServerMetadata {
    pub fn load() -> Self {
        let version = env::var("HUDDLE_VERSION").unwrap_or_else(|_| {
            env!("CARGO_PKG_VERSION").to_string()
        });

        let message = env::var("HUDDLE_SERVER_MESSAGE")
            .unwrap_or_else(|_| format!("Huddle {version} Server"));

        Self { version, message }
    }
}

pub fn build_state(database: &Database, config: &AppConfig) -> AppState {
    AppState {
        config: Arc::new(config.clone()),
        user_store: UserStore::new(database),
        workspace_store: WorkspaceStore::new(database),
        metadata: ServerMetadata::load(),
    }
}
