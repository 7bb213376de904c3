#![allow(dead_code)]


use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use tracing_subscriber::EnvFilter;

pub struct TestContext {
    pub db: DatabaseConnection,
}

impl TestContext {
    /// A fresh in-memory SQLite database with every feature table created
    pub async fn new(test_name: &str) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let mut options = ConnectOptions::new("sqlite::memory:");
        // every connection of the pool would get its own in-memory database
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("Fail to connect to in-memory SQLite");
        features::create_tables(&db)
            .await
            .expect("Fail to create tables");
        tracing::debug!(test_name, "Test database ready");

        Self { db }
    }
}

pub async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let stmt = Schema::new(backend).create_table_from_entity(entity);
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
