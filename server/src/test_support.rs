#![allow(dead_code)]

use tempfile::TempDir;

use huddle_core::{
    config::AppConfig,
    db::Database,
    ids::{UserId, WorkspaceId},
    user::{UserProfile, UserRecord},
    workspace::CreateWorkspaceParams,
    workspace_member::WorkspaceRole,
};

use crate::{
    state::{AppState, build_state},
    utils::db::run_migrations,
};

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    setup_state_with(AppConfig::default()).await
}

pub(crate) async fn setup_state_with_token(token: &str) -> (TempDir, Database, AppState) {
    let mut config = AppConfig::default();
    config.webhook_token = Some(token.to_owned());
    setup_state_with(config).await
}

async fn setup_state_with(mut config: AppConfig) -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let db_path = temp_dir.path().join("test.db");
    config.database_path = db_path.to_string_lossy().into_owned();

    let database = Database::connect(&config).await.expect("connect database");
    run_migrations(database.pool())
        .await
        .expect("apply migrations");

    let state = build_state(&database, &config);

    (temp_dir, database, state)
}

pub(crate) async fn seed_user(state: &AppState, id: &str, email: Option<&str>) -> UserRecord {
    state
        .user_store
        .create(
            &UserId::from(id),
            &UserProfile {
                email: email.map(ToOwned::to_owned),
                name: None,
                username: None,
                avatar_url: None,
            },
        )
        .await
        .expect("seed user")
}

pub(crate) async fn seed_workspace(state: &AppState, id: &str, owner: &UserRecord) -> WorkspaceId {
    let workspace = state
        .workspace_store
        .create(CreateWorkspaceParams {
            id: WorkspaceId::from(id),
            name: "Test Workspace".to_owned(),
            slug: None,
            owner_id: owner.id.clone(),
            avatar_url: None,
        })
        .await
        .expect("seed workspace");
    workspace.id
}

pub(crate) async fn seed_member(
    state: &AppState,
    workspace_id: &WorkspaceId,
    user: &UserRecord,
    role: WorkspaceRole,
) {
    state
        .workspace_store
        .create_member(workspace_id, &user.id, role, None)
        .await
        .expect("seed member");
}
