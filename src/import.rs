//! JSON-lines bulk import.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::saver::BatchSaver;
use crate::schema::Record;

/// Counts from one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Non-blank lines read
    pub lines: usize,
    /// Records handed to the saver
    pub saved: usize,
    /// Lines that did not deserialize into a record
    pub skipped: usize,
}

/// Reads `path` line by line and saves every record through `saver`.
///
/// Blank lines are ignored. Lines that fail to deserialize are logged and
/// skipped. The saver is not closed; records may still be buffered when this
/// returns.
///
/// # Errors
///
/// Fails if the file cannot be read, or if a save fails (the size-triggered
/// flush error is returned as is, with the line number as context).
pub async fn import_jsonl<T>(saver: &BatchSaver<T>, path: &Path) -> Result<ImportReport>
where
    T: Record + DeserializeOwned,
{
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut report = ImportReport::default();
    let mut line_no = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?
    {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        report.lines += 1;

        let record: T = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping line {} of {}: {}", line_no, path.display(), e);
                report.skipped += 1;
                continue;
            }
        };
        saver
            .save(record)
            .await
            .with_context(|| format!("Failed to save line {} of {}", line_no, path.display()))?;
        report.saved += 1;
    }

    info!(
        "Read {} records from {} ({} saved, {} skipped)",
        report.lines,
        path.display(),
        report.saved,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::config::SaverConfig;
    use crate::models::UserAsset;
    use crate::schema::SqlValue;
    use crate::test_helpers::RecordingSink;

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        for line in lines {
            writeln!(file, "{}", line).expect("write line");
        }
        file
    }

    #[tokio::test]
    async fn test_import_saves_valid_lines_and_skips_bad_ones() {
        let file = write_lines(&[
            r#"{"user_id":"u1","asset_id":"a1","name":"one","url":"https://x/1","type":"image"}"#,
            "",
            "not json",
            r#"{"user_id":"u2","asset_id":"a2","name":"two","url":"https://x/2","type":"audio","size":9}"#,
        ]);
        let sink = RecordingSink::mysql();
        let saver = BatchSaver::<UserAsset>::new(
            SaverConfig::new(sink.clone())
                .with_unique_keys(["asset_id"])
                .with_flush_interval(Duration::from_secs(60)),
        )
        .unwrap();

        let report = import_jsonl(&saver, file.path()).await.unwrap();
        assert_eq!(
            report,
            ImportReport {
                lines: 3,
                saved: 2,
                skipped: 1
            }
        );
        assert_eq!(saver.stats().await.buffered, 2);

        saver.close().await.unwrap();
        let values = sink.written_values();
        assert!(values.contains(&SqlValue::Text("a1".to_string())));
        assert!(values.contains(&SqlValue::Int(9)));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let sink = RecordingSink::mysql();
        let saver = BatchSaver::<UserAsset>::new(SaverConfig::new(sink)).unwrap();
        let err = import_jsonl(&saver, Path::new("/nonexistent/assets.jsonl"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
        saver.close().await.unwrap();
    }
}
