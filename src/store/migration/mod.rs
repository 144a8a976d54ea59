//! Database migrations. `sea_orm_migration` tracks which of these have
//! already run in a `seaql_migrations` table, so re-running `up()` on an
//! already-migrated catalogue is a no-op — this is what gives startup
//! its idempotence, without any hand-rolled column-presence probing.

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_initial_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
	fn migrations() -> Vec<Box<dyn MigrationTrait>> {
		vec![Box::new(m20260101_000001_create_initial_tables::Migration)]
	}
}
