//! Online SQLite backup: one file per day, rolling retention by filename.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;

/// Run an online backup via `VACUUM INTO`; safe while the pool is writing
/// (WAL mode). Returns the backup path.
pub async fn run_backup(
    pool: &SqlitePool,
    backups_dir: &Path,
    keep: usize,
) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(backups_dir)
        .await
        .map_err(|e| AppError::Internal(format!("cannot create backups dir: {e}")))?;

    let date = Utc::now().format("%Y-%m-%d");
    let dest = backups_dir.join(format!("jobs-{date}.db"));

    // VACUUM INTO refuses to overwrite; same-day reruns replace the file.
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        tokio::fs::remove_file(&dest)
            .await
            .map_err(|e| AppError::Internal(format!("cannot replace old backup: {e}")))?;
    }

    let statement = format!("VACUUM INTO '{}'", dest.display());
    sqlx::query(&statement).execute(pool).await?;

    let size_kb = tokio::fs::metadata(&dest)
        .await
        .map(|m| m.len() / 1024)
        .unwrap_or(0);
    tracing::info!(dest = %dest.display(), size_kb, "backup completed");

    prune_old_backups(backups_dir, keep).await;
    Ok(dest)
}

/// Keep only the `keep` most recent `jobs-*.db` files, by descending
/// filename (the date format makes that chronological).
async fn prune_old_backups(backups_dir: &Path, keep: usize) {
    let Ok(mut entries) = tokio::fs::read_dir(backups_dir).await else {
        return;
    };

    let mut backups: Vec<PathBuf> = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("jobs-") && name.ends_with(".db") {
            backups.push(entry.path());
        }
    }

    backups.sort();
    backups.reverse();
    for old in backups.into_iter().skip(keep) {
        if tokio::fs::remove_file(&old).await.is_ok() {
            tracing::info!(path = %old.display(), "backup pruned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prune_keeps_newest_by_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        for date in ["2026-07-01", "2026-07-02", "2026-07-03", "2026-07-04"] {
            tokio::fs::write(dir.path().join(format!("jobs-{date}.db")), b"x")
                .await
                .expect("write");
        }
        tokio::fs::write(dir.path().join("unrelated.txt"), b"x")
            .await
            .expect("write");

        prune_old_backups(dir.path(), 2).await;

        let mut kept: Vec<String> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        kept.sort();
        assert_eq!(
            kept,
            vec![
                "jobs-2026-07-03.db".to_string(),
                "jobs-2026-07-04.db".to_string(),
                "unrelated.txt".to_string(),
            ]
        );
    }
}
