//! Conexión a PostgreSQL
//!
//! Este módulo abre el pool de conexiones y crea el esquema del store de
//! telemetría si todavía no existe.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::config::database::{mask_database_url, DatabaseConfig};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vehicle_states (
        vehicle_id  TEXT PRIMARY KEY,
        status      TEXT,
        state       JSONB NOT NULL,
        last_update TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vehicle_history (
        vehicle_id  TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        sample      JSONB NOT NULL,
        PRIMARY KEY (vehicle_id, recorded_at)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS vehicle_states_status_idx ON vehicle_states (status)",
];

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar usando `DATABASE_URL` y crear el esquema
    pub async fn new_default() -> Result<Self> {
        Self::connect(&DatabaseConfig::from_env()?).await
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("🔗 Conectando a PostgreSQL: {}", mask_database_url(&config.url));
        let pool = config.create_pool().await?;

        let connection = Self { pool };
        connection.run_migrations().await?;
        info!("✅ Base de datos lista");
        Ok(connection)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Crear tablas e índices si no existen
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}
