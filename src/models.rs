//! Record types persisted by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error_handling::DatabaseError;
use crate::schema::{Record, RecordShape};
use crate::sink::{Dialect, RelationalSink};

/// Bookkeeping columns shared by every gateway table.
///
/// Embed it as the first member of a record shape. `deleted_at` is the
/// soft-delete marker and is never written by a batch saver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    /// Assigned by the database when absent
    #[serde(default)]
    pub id: Option<u64>,
    /// Creation time; now when absent from the input
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update time; now when absent from the input
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker, never written by a saver
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record for Model {
    fn shape() -> RecordShape<Self> {
        RecordShape::new("Model")
            .tagged_field("ID", "primaryKey;autoIncrement", |m: &Model| &m.id)
            .field("CreatedAt", |m: &Model| &m.created_at)
            .field("UpdatedAt", |m: &Model| &m.updated_at)
            .tagged_field("DeletedAt", "index", |m: &Model| &m.deleted_at)
    }
}

/// An image, audio or video asset owned by a user.
///
/// Stored in `user_assets`; `asset_id` is unique and is the natural upsert
/// key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserAsset {
    /// Id and timestamps
    #[serde(flatten)]
    pub model: Model,
    /// Owning user
    pub user_id: String,
    /// Unique external id
    pub asset_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Where the asset can be fetched
    pub url: String,
    /// `url` or `file`
    #[serde(default = "default_source")]
    pub source: String,
    /// `image`, `audio` or `video`
    #[serde(rename = "type")]
    pub kind: String,
    /// Size in bytes, when known
    #[serde(default)]
    pub size: Option<i64>,
    /// MIME type, e.g. `image/png`
    #[serde(default)]
    pub mime_type: String,
    /// Storage backend the asset was copied to
    #[serde(default)]
    pub storage_config_id: Option<u64>,
    /// URL in that storage backend
    #[serde(default)]
    pub storage_url: String,
}

fn default_source() -> String {
    "url".to_string()
}

impl Record for UserAsset {
    fn shape() -> RecordShape<Self> {
        RecordShape::new("UserAsset")
            .table("user_assets")
            .embed("Model", |a: &UserAsset| &a.model)
            .tagged_field("UserID", "type:varchar(100);not null;index", |a: &UserAsset| {
                &a.user_id
            })
            .tagged_field(
                "AssetID",
                "type:varchar(100);not null;uniqueIndex",
                |a: &UserAsset| &a.asset_id,
            )
            .tagged_field("Name", "type:varchar(255);not null", |a: &UserAsset| &a.name)
            .tagged_field("Description", "type:text", |a: &UserAsset| &a.description)
            .tagged_field("URL", "type:text;not null", |a: &UserAsset| &a.url)
            .tagged_field(
                "Source",
                "type:varchar(20);not null;default:'url'",
                |a: &UserAsset| &a.source,
            )
            .tagged_field("Type", "type:varchar(20);not null;index", |a: &UserAsset| {
                &a.kind
            })
            .tagged_field("Size", "type:bigint", |a: &UserAsset| &a.size)
            .tagged_field("MimeType", "type:varchar(100)", |a: &UserAsset| &a.mime_type)
            .tagged_field("StorageConfigID", "index", |a: &UserAsset| {
                &a.storage_config_id
            })
            .tagged_field("StorageURL", "type:text", |a: &UserAsset| &a.storage_url)
    }
}

const USER_ASSETS_MYSQL: &str = "CREATE TABLE IF NOT EXISTS `user_assets` (
    `id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    `created_at` DATETIME(3) NULL,
    `updated_at` DATETIME(3) NULL,
    `deleted_at` DATETIME(3) NULL,
    `user_id` VARCHAR(100) NOT NULL,
    `asset_id` VARCHAR(100) NOT NULL,
    `name` VARCHAR(255) NOT NULL,
    `description` TEXT,
    `url` TEXT NOT NULL,
    `source` VARCHAR(20) NOT NULL DEFAULT 'url',
    `type` VARCHAR(20) NOT NULL,
    `size` BIGINT NULL,
    `mime_type` VARCHAR(100),
    `storage_config_id` BIGINT UNSIGNED NULL,
    `storage_url` TEXT,
    UNIQUE KEY `idx_user_assets_asset_id` (`asset_id`),
    KEY `idx_user_assets_user_id` (`user_id`),
    KEY `idx_user_assets_type` (`type`),
    KEY `idx_user_assets_deleted_at` (`deleted_at`)
)";

const USER_ASSETS_SQLITE: &str = "CREATE TABLE IF NOT EXISTS `user_assets` (
    `id` INTEGER PRIMARY KEY AUTOINCREMENT,
    `created_at` DATETIME,
    `updated_at` DATETIME,
    `deleted_at` DATETIME,
    `user_id` TEXT NOT NULL,
    `asset_id` TEXT NOT NULL UNIQUE,
    `name` TEXT NOT NULL,
    `description` TEXT,
    `url` TEXT NOT NULL,
    `source` TEXT NOT NULL DEFAULT 'url',
    `type` TEXT NOT NULL,
    `size` INTEGER,
    `mime_type` TEXT,
    `storage_config_id` INTEGER,
    `storage_url` TEXT
)";

/// Creates the `user_assets` table when it does not exist yet.
pub async fn ensure_user_assets_table(sink: &dyn RelationalSink) -> Result<(), DatabaseError> {
    let ddl = match sink.dialect() {
        Dialect::MySql => USER_ASSETS_MYSQL,
        Dialect::Sqlite => USER_ASSETS_SQLITE,
    };
    sink.execute(ddl, Vec::new()).await?;
    Ok(())
}
