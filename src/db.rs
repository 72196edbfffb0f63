//! Connection pool setup and schema management for Postgres.

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

use crate::config::Settings;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let mut options: PgConnectOptions = settings
        .database_url
        .parse()
        .context("DATABASE_URL is not a valid Postgres connection string")?;
    // sqlx logs statements at debug; the `sqlx` filter directive decides whether they show
    if !settings.db_echo {
        options = options.disable_statement_logging();
    }

    let pool = PgPoolOptions::new()
        .min_connections(settings.db_pool_size)
        .max_connections(settings.max_connections())
        .acquire_timeout(settings.db_acquire_timeout)
        .connect_with(options)
        .await
        .context("can't connect to database")?;

    tracing::info!(
        min_connections = settings.db_pool_size,
        max_connections = settings.max_connections(),
        "database pool ready"
    );
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await.context("running migrations")?;
    Ok(())
}

/// Drops every table and type the migrations created, then applies them again.
///
/// Development only: all data is lost.
pub async fn reset_schema(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for statement in [
        "DROP TABLE IF EXISTS matches CASCADE",
        "DROP TABLE IF EXISTS teams CASCADE",
        "DROP TABLE IF EXISTS competitions CASCADE",
        "DROP TABLE IF EXISTS _sqlx_migrations",
        "DROP TYPE IF EXISTS match_status",
        "DROP TYPE IF EXISTS competition_type",
    ] {
        tracing::warn!(statement, "dropping");
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    migrate(pool).await
}

#[derive(Debug, sqlx::FromRow)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IndexInfo {
    pub table_name: String,
    pub index_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ForeignKeyInfo {
    pub table_name: String,
    pub constraint_name: String,
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Default)]
pub struct SchemaReport {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl SchemaReport {
    pub fn tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self.columns.iter().map(|c| c.table_name.as_str()).collect();
        tables.dedup();
        tables
    }
}

pub async fn describe(pool: &PgPool) -> anyhow::Result<SchemaReport> {
    let columns = sqlx::query_as(
        r#"
        SELECT table_name::text, column_name::text, data_type::text
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name <> '_sqlx_migrations'
        ORDER BY table_name, ordinal_position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let indexes = sqlx::query_as(
        r#"
        SELECT tablename::text AS table_name, indexname::text AS index_name
        FROM pg_indexes
        WHERE schemaname = 'public' AND tablename <> '_sqlx_migrations'
        ORDER BY tablename, indexname
        "#,
    )
    .fetch_all(pool)
    .await?;

    let foreign_keys = sqlx::query_as(
        r#"
        SELECT tc.table_name::text, tc.constraint_name::text, kcu.column_name::text,
               ccu.table_name::text AS referenced_table, ccu.column_name::text AS referenced_column
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage ccu
          ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema
        WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public'
        ORDER BY tc.table_name, tc.constraint_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(SchemaReport {
        columns,
        indexes,
        foreign_keys,
    })
}
