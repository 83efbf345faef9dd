// Shared test helpers for SQLite-backed saver tests.

use std::sync::Arc;

use sqlx::SqlitePool;

use batch_saver::models::{ensure_user_assets_table, UserAsset};
use batch_saver::SqliteSink;

/// Opens an in-memory database with the `user_assets` table created.
#[allow(dead_code)] // Used by other test files
pub async fn create_asset_sink() -> Arc<SqliteSink> {
    let sink = SqliteSink::in_memory()
        .await
        .expect("Failed to open in-memory database");
    ensure_user_assets_table(&sink)
        .await
        .expect("Failed to create user_assets table");
    Arc::new(sink)
}

/// Builds a user asset with only the identity fields set.
#[allow(dead_code)]
pub fn asset(asset_id: &str, name: &str) -> UserAsset {
    UserAsset {
        user_id: "user-1".to_string(),
        asset_id: asset_id.to_string(),
        name: name.to_string(),
        url: format!("https://assets.example.com/{}", asset_id),
        kind: "image".to_string(),
        source: "url".to_string(),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub async fn count_assets(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_assets")
        .fetch_one(pool)
        .await
        .expect("Failed to count user_assets")
}

#[allow(dead_code)]
pub async fn asset_name(pool: &SqlitePool, asset_id: &str) -> Option<String> {
    sqlx::query_scalar("SELECT name FROM user_assets WHERE asset_id = ?")
        .bind(asset_id)
        .fetch_optional(pool)
        .await
        .expect("Failed to query user_assets")
}
