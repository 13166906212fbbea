//! SeaORM entity definitions for the harvester database schema.

pub mod commit;
pub mod prelude;
pub mod repository;
