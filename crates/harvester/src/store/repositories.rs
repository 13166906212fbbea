use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::errors::{Result, StoreError};
use crate::entity::repository::{ActiveModel, Column, Entity as Repository, Model};
use crate::fetch::RepositoryMetadata;

// ─── Lookups ─────────────────────────────────────────────────────────────────

/// Find a repository by its natural key (owner + name).
pub async fn find_by_owner_and_name<C: ConnectionTrait>(
    db: &C,
    owner: &str,
    name: &str,
) -> Result<Option<Model>> {
    Repository::find()
        .filter(Column::Owner.eq(owner))
        .filter(Column::Name.eq(name))
        .one(db)
        .await
        .map_err(StoreError::from)
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert a new repository from freshly fetched metadata.
///
/// # Errors
/// Returns `StoreError::Database` if the insert fails (e.g., duplicate owner/name).
pub async fn insert_repository<C: ConnectionTrait>(
    db: &C,
    meta: &RepositoryMetadata,
    now: DateTime<Utc>,
) -> Result<Model> {
    let now = now.fixed_offset();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        provider_id: Set(meta.provider_id),
        owner: Set(meta.owner.clone()),
        name: Set(meta.name.clone()),
        description: Set(meta.description.clone()),
        url: Set(meta.url.clone()),
        language: Set(meta.language.clone()),
        forks_count: Set(meta.forks_count),
        stars_count: Set(meta.stars_count),
        open_issues_count: Set(meta.open_issues_count),
        watchers_count: Set(meta.watchers_count),
        provider_created_at: Set(meta.provider_created_at.fixed_offset()),
        provider_updated_at: Set(meta.provider_updated_at.fixed_offset()),
        last_synced_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(db).await.map_err(StoreError::from)
}

/// Refresh the mutable metadata of an existing repository.
///
/// Identity (`owner`, `name`, `provider_id`) is left untouched even if the
/// provider now reports different values, e.g. after a rename.
pub async fn update_metadata<C: ConnectionTrait>(
    db: &C,
    existing: Model,
    meta: &RepositoryMetadata,
    now: DateTime<Utc>,
) -> Result<Model> {
    let mut model: ActiveModel = existing.into();
    model.description = Set(meta.description.clone());
    model.url = Set(meta.url.clone());
    model.language = Set(meta.language.clone());
    model.forks_count = Set(meta.forks_count);
    model.stars_count = Set(meta.stars_count);
    model.open_issues_count = Set(meta.open_issues_count);
    model.watchers_count = Set(meta.watchers_count);
    model.provider_created_at = Set(meta.provider_created_at.fixed_offset());
    model.provider_updated_at = Set(meta.provider_updated_at.fixed_offset());
    model.updated_at = Set(now.fixed_offset());
    model.update(db).await.map_err(StoreError::from)
}

/// Insert the repository if `(owner, name)` is unknown, otherwise refresh it.
///
/// Returns the stored model and whether it was created.
pub async fn upsert_repository<C: ConnectionTrait>(
    db: &C,
    owner: &str,
    name: &str,
    meta: &RepositoryMetadata,
    now: DateTime<Utc>,
) -> Result<(Model, bool)> {
    match find_by_owner_and_name(db, owner, name).await? {
        Some(existing) => Ok((update_metadata(db, existing, meta, now).await?, false)),
        None => {
            // Store the configured identity; the provider may answer a
            // redirected name for renamed repositories.
            let mut meta = meta.clone();
            meta.owner = owner.to_string();
            meta.name = name.to_string();
            Ok((insert_repository(db, &meta, now).await?, true))
        }
    }
}

/// Record that a sync completed for the repository.
///
/// # Errors
/// Returns `StoreError::NotFound` if no repository has this id.
pub async fn touch_synced<C: ConnectionTrait>(db: &C, id: Uuid, now: DateTime<Utc>) -> Result<()> {
    let now = now.fixed_offset();
    let result = Repository::update_many()
        .col_expr(Column::LastSyncedAt, Expr::value(now))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::repository_not_found(id));
    }
    Ok(())
}
