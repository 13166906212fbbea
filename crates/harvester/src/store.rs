//! Storage collaborator for repository and commit records.
//!
//! Every operation is generic over [`sea_orm::ConnectionTrait`], so the sync
//! unit can run all of them inside a single transaction while tests and the
//! CLI call them on a plain connection.

mod commits;
mod errors;
mod repositories;

pub use commits::{
    INSERT_BATCH_SIZE, count_commits, insert_commits, latest_commit_date, list_commits,
};
pub use errors::{Result, StoreError};
pub use repositories::{
    find_by_owner_and_name, insert_repository, touch_synced, update_metadata, upsert_repository,
};
