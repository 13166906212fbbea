use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::errors::{Result, StoreError};
use crate::entity::commit::{ActiveModel, Column, Entity as Commit, Model};
use crate::fetch::CommitData;

/// Most recent stored commit date for a repository, if it has any commits.
pub async fn latest_commit_date<C: ConnectionTrait>(
    db: &C,
    repository_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let latest = Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .order_by_desc(Column::CommitDate)
        .one(db)
        .await?;
    Ok(latest.map(|c| c.commit_date.with_timezone(&Utc)))
}

/// Rows per `INSERT` statement. Nine bind variables per row keeps a batch
/// well under SQLite's 32,766-variable limit.
pub const INSERT_BATCH_SIZE: usize = 500;

/// Bulk-insert commits for a repository in batches of [`INSERT_BATCH_SIZE`].
///
/// Returns the number of rows inserted. A commit that already exists for the
/// repository violates the `(repository_id, sha)` constraint and fails the
/// call; run it inside a transaction to discard earlier batches.
pub async fn insert_commits<C: ConnectionTrait>(
    db: &C,
    repository_id: Uuid,
    commits: &[CommitData],
    now: DateTime<Utc>,
) -> Result<u64> {
    if commits.is_empty() {
        return Ok(0);
    }
    if let Some(bad) = commits.iter().find(|c| c.sha.is_empty()) {
        return Err(StoreError::InvalidInput {
            message: format!("commit dated {} has an empty sha", bad.commit_date),
        });
    }

    let now = now.fixed_offset();
    let mut inserted = 0;
    for batch in commits.chunks(INSERT_BATCH_SIZE) {
        let models = batch.iter().map(|c| ActiveModel {
            id: Set(Uuid::new_v4()),
            repository_id: Set(repository_id),
            sha: Set(c.sha.clone()),
            author_name: Set(c.author_name.clone()),
            author_email: Set(c.author_email.clone()),
            message: Set(c.message.clone()),
            url: Set(c.url.clone()),
            commit_date: Set(c.commit_date.fixed_offset()),
            created_at: Set(now),
        });
        inserted += Commit::insert_many(models)
            .exec_without_returning(db)
            .await?;
    }
    Ok(inserted)
}

/// Count stored commits for a repository.
pub async fn count_commits<C: ConnectionTrait>(db: &C, repository_id: Uuid) -> Result<u64> {
    Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .count(db)
        .await
        .map_err(StoreError::from)
}

/// List stored commits for a repository, newest first.
pub async fn list_commits<C: ConnectionTrait>(db: &C, repository_id: Uuid) -> Result<Vec<Model>> {
    Commit::find()
        .filter(Column::RepositoryId.eq(repository_id))
        .order_by_desc(Column::CommitDate)
        .all(db)
        .await
        .map_err(StoreError::from)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use super::*;
    use crate::db::connect_and_migrate;
    use crate::fetch::RepositoryMetadata;
    use crate::store::insert_repository;
    use sea_orm::{DatabaseConnection, TransactionTrait};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn commit(sha: &str, date: &str) -> CommitData {
        CommitData {
            sha: sha.to_string(),
            author_name: "Ada".to_string(),
            author_email: "ada@example.com".to_string(),
            message: format!("commit {sha}"),
            url: format!("https://github.com/acme/widgets/commit/{sha}"),
            commit_date: ts(date),
        }
    }

    async fn setup() -> (DatabaseConnection, Uuid) {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let meta = RepositoryMetadata {
            provider_id: 1,
            owner: "acme".to_string(),
            name: "widgets".to_string(),
            description: None,
            url: "https://github.com/acme/widgets".to_string(),
            language: None,
            forks_count: 0,
            stars_count: 0,
            open_issues_count: 0,
            watchers_count: 0,
            provider_created_at: ts("2020-01-01T00:00:00Z"),
            provider_updated_at: ts("2024-01-01T00:00:00Z"),
        };
        let repo = insert_repository(&db, &meta, ts("2024-02-01T00:00:00Z"))
            .await
            .unwrap();
        (db, repo.id)
    }

    #[tokio::test]
    async fn latest_commit_date_is_none_without_commits() {
        let (db, repo_id) = setup().await;
        assert_eq!(latest_commit_date(&db, repo_id).await.unwrap(), None);
        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let (db, repo_id) = setup().await;
        let inserted = insert_commits(
            &db,
            repo_id,
            &[
                commit("b", "2024-01-02T00:00:00Z"),
                commit("a", "2024-01-01T00:00:00Z"),
                commit("c", "2024-01-01T12:00:00Z"),
            ],
            ts("2024-02-01T00:00:00Z"),
        )
        .await
        .unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 3);
        assert_eq!(
            latest_commit_date(&db, repo_id).await.unwrap(),
            Some(ts("2024-01-02T00:00:00Z"))
        );

        let shas: Vec<String> = list_commits(&db, repo_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.sha)
            .collect();
        assert_eq!(shas, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn large_history_is_inserted_in_batches() {
        let (db, repo_id) = setup().await;
        let start = ts("2023-01-01T00:00:00Z");
        let history: Vec<CommitData> = (0..5_000)
            .map(|i| CommitData {
                commit_date: start + chrono::Duration::minutes(i),
                ..commit(&format!("{i:040x}"), "2023-01-01T00:00:00Z")
            })
            .collect();

        let txn = db.begin().await.unwrap();
        let inserted = insert_commits(&txn, repo_id, &history, ts("2024-02-01T00:00:00Z"))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(inserted, 5_000);
        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn duplicate_in_later_batch_rolls_back_earlier_batches() {
        let (db, repo_id) = setup().await;
        let mut history: Vec<CommitData> = (0..INSERT_BATCH_SIZE + 10)
            .map(|i| commit(&format!("{i:040x}"), "2023-06-01T00:00:00Z"))
            .collect();
        history.push(commit(&format!("{:040x}", 0), "2023-06-01T00:00:00Z"));

        let txn = db.begin().await.unwrap();
        let err = insert_commits(&txn, repo_id, &history, ts("2024-02-01T00:00:00Z"))
            .await
            .unwrap_err();
        txn.rollback().await.unwrap();

        assert!(err.is_unique_violation(), "unexpected error: {err}");
        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_insert_is_a_no_op() {
        let (db, repo_id) = setup().await;
        assert_eq!(
            insert_commits(&db, repo_id, &[], ts("2024-02-01T00:00:00Z"))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn duplicate_sha_violates_uniqueness() {
        let (db, repo_id) = setup().await;
        let now = ts("2024-02-01T00:00:00Z");
        insert_commits(&db, repo_id, &[commit("a", "2024-01-01T00:00:00Z")], now)
            .await
            .unwrap();

        let err = insert_commits(&db, repo_id, &[commit("a", "2024-01-01T00:00:00Z")], now)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation(), "unexpected error: {err}");
        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_sha_is_invalid_input() {
        let (db, repo_id) = setup().await;
        let err = insert_commits(
            &db,
            repo_id,
            &[commit("", "2024-01-01T00:00:00Z")],
            ts("2024-02-01T00:00:00Z"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn rolled_back_insert_leaves_no_rows() {
        let (db, repo_id) = setup().await;
        let txn = db.begin().await.unwrap();
        insert_commits(
            &txn,
            repo_id,
            &[commit("a", "2024-01-01T00:00:00Z")],
            ts("2024-02-01T00:00:00Z"),
        )
        .await
        .unwrap();
        assert_eq!(count_commits(&txn, repo_id).await.unwrap(), 1);
        txn.rollback().await.unwrap();

        assert_eq!(count_commits(&db, repo_id).await.unwrap(), 0);
    }
}
