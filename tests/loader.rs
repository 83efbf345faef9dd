//! Loader runs driven through `run_import`, as the binary does.

use std::io::Write;

use clap::Parser;
use sqlx::SqlitePool;

use batch_saver::{run_import, Opt};

fn jsonl(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[tokio::test]
async fn test_run_import_loads_and_upserts_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("loader.db");
    let db = format!("sqlite:{}", db_path.display());
    let file = jsonl(&[
        r#"{"user_id":"u1","asset_id":"a1","name":"cat","url":"https://x/cat.png","type":"image"}"#,
        r#"{"user_id":"u1","asset_id":"a2","name":"dog","url":"https://x/dog.png","type":"image","size":12}"#,
        r#"{"broken": "#,
        r#"{"user_id":"u1","asset_id":"a1","name":"cat v2","url":"https://x/cat2.png","type":"image"}"#,
    ]);

    let opt = Opt::try_parse_from([
        "batch_saver",
        file.path().to_str().unwrap(),
        "--db",
        &db,
        "--batch-size",
        "2",
    ])
    .unwrap();
    let report = run_import(opt).await.unwrap();

    assert_eq!(report.table, "user_assets");
    assert_eq!(report.import.lines, 4);
    assert_eq!(report.import.saved, 3);
    assert_eq!(report.import.skipped, 1);
    assert_eq!(report.stats.flushed_rows, 3);
    assert_eq!(report.stats.buffered, 0);

    let pool = SqlitePool::connect(&db).await.unwrap();
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT asset_id, name FROM user_assets ORDER BY asset_id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("a1".to_string(), "cat v2".to_string()),
            ("a2".to_string(), "dog".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_run_import_rejects_unknown_database_scheme() {
    let file = jsonl(&[]);
    let opt = Opt::try_parse_from([
        "batch_saver",
        file.path().to_str().unwrap(),
        "--db",
        "postgres://localhost/app",
    ])
    .unwrap();
    let err = run_import(opt).await.unwrap_err();
    assert!(format!("{:#}", err).contains("unsupported database URL scheme"));
}
