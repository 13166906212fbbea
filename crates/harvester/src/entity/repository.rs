//! Repository entity - one row per tracked upstream repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Repository model.
///
/// `(owner, name)` is unique. `owner`, `name` and `provider_id` are written
/// once on insert; every other field is refreshed on each sync.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    /// Provider-assigned numeric ID.
    pub provider_id: i64,
    /// Owner login (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,

    // ─── Content ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Browser URL.
    #[sea_orm(column_type = "Text")]
    pub url: String,
    /// Primary programming language.
    pub language: Option<String>,

    // ─── Statistics ──────────────────────────────────────────────────────────
    pub forks_count: i32,
    pub stars_count: i32,
    pub open_issues_count: i32,
    pub watchers_count: i32,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    /// When the repository was created on the provider.
    pub provider_created_at: DateTimeWithTimeZone,
    /// When the provider last reported a change.
    pub provider_updated_at: DateTimeWithTimeZone,

    // ─── Tracking ────────────────────────────────────────────────────────────
    /// When a sync unit last completed for this repository.
    pub last_synced_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commit::Entity")]
    Commit,
}

impl Related<super::commit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Compute the full name (owner/name).
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
