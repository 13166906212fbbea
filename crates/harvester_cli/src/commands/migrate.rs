use harvester::db;
use harvester::migration::{Migrator, MigratorTrait};

use crate::MigrateAction;

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            tracing::info!("Applying migrations");
            Migrator::up(&db, None).await?;
            tracing::info!("Migrations applied");
        }
        MigrateAction::Down => {
            tracing::info!("Rolling back last migration");
            Migrator::down(&db, Some(1)).await?;
            tracing::info!("Rollback complete");
        }
        MigrateAction::Status => {
            Migrator::status(&db).await?;
        }
        MigrateAction::Fresh => {
            tracing::warn!("Dropping all tables and reapplying migrations");
            Migrator::fresh(&db).await?;
            tracing::info!("Fresh migration complete");
        }
    }

    Ok(())
}
