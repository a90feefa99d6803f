use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::history::{HistoryEntry, HistoryQuery};
use crate::models::vehicle_state::VehicleState;
use crate::utils::errors::AppError;

/// Almacén del estado actual de la flota y su historial acotado.
///
/// La unidad atómica es el registro: un upsert de estado, o una inserción de
/// historial junto con el recorte al límite de retención.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn upsert_state(&self, state: &VehicleState) -> Result<(), AppError>;

    async fn find_state(&self, vehicle_id: &str) -> Result<Option<VehicleState>, AppError>;

    async fn list_states(&self) -> Result<Vec<VehicleState>, AppError>;

    async fn count_states(&self) -> Result<i64, AppError>;

    /// Devuelve `true` si la entrada quedó retenida
    async fn append_history(&self, vehicle_id: &str, entry: &HistoryEntry, cap: usize) -> Result<bool, AppError>;

    async fn latest_history(&self, vehicle_id: &str) -> Result<Option<HistoryEntry>, AppError>;

    async fn query_history(&self, vehicle_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, AppError>;
}

#[derive(sqlx::FromRow)]
struct StateRow {
    state: Json<VehicleState>,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    recorded_at: DateTime<Utc>,
    sample: Json<Value>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry::new(row.recorded_at, row.sample.0)
    }
}

pub struct PgTelemetryStore {
    pool: PgPool,
}

impl PgTelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn upsert_state(&self, state: &VehicleState) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO vehicle_states (vehicle_id, status, state, last_update)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vehicle_id) DO UPDATE
            SET status = EXCLUDED.status, state = EXCLUDED.state, last_update = EXCLUDED.last_update
            "#,
        )
        .bind(&state.vehicle_id)
        .bind(state.status.map(|s| s.as_str()))
        .bind(Json(state))
        .bind(state.last_update)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_state(&self, vehicle_id: &str) -> Result<Option<VehicleState>, AppError> {
        let row = sqlx::query_as::<_, StateRow>("SELECT state FROM vehicle_states WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.state.0))
    }

    async fn list_states(&self) -> Result<Vec<VehicleState>, AppError> {
        let rows = sqlx::query_as::<_, StateRow>("SELECT state FROM vehicle_states ORDER BY vehicle_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.state.0).collect())
    }

    async fn count_states(&self) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicle_states")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn append_history(&self, vehicle_id: &str, entry: &HistoryEntry, cap: usize) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO vehicle_history (vehicle_id, recorded_at, sample)
            VALUES ($1, $2, $3)
            ON CONFLICT (vehicle_id, recorded_at) DO NOTHING
            "#,
        )
        .bind(vehicle_id)
        .bind(entry.timestamp)
        .bind(Json(&entry.sample))
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        // Recorte al límite: se conservan las `cap` muestras más recientes
        let evicted = sqlx::query(
            r#"
            DELETE FROM vehicle_history
            WHERE vehicle_id = $1
              AND recorded_at < (
                  SELECT recorded_at FROM vehicle_history
                  WHERE vehicle_id = $1
                  ORDER BY recorded_at DESC
                  OFFSET $2 LIMIT 1
              )
            "#,
        )
        .bind(vehicle_id)
        .bind(cap.max(1) as i64 - 1)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if evicted > 0 {
            tracing::debug!(vehicle_id, evicted, "🧹 Historial recortado al límite de retención");
        }

        if !inserted {
            return Ok(false);
        }

        // una muestra más antigua que todo lo retenido se desaloja en el mismo recorte
        let retained: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM vehicle_history WHERE vehicle_id = $1 AND recorded_at = $2")
                .bind(vehicle_id)
                .bind(entry.timestamp)
                .fetch_optional(&self.pool)
                .await?;

        Ok(retained.is_some())
    }

    async fn latest_history(&self, vehicle_id: &str) -> Result<Option<HistoryEntry>, AppError> {
        let row = sqlx::query_as::<_, HistoryRow>(
            "SELECT recorded_at, sample FROM vehicle_history WHERE vehicle_id = $1 ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(HistoryEntry::from))
    }

    async fn query_history(&self, vehicle_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT recorded_at, sample FROM vehicle_history
            WHERE vehicle_id = $1
              AND ($2::timestamptz IS NULL OR recorded_at >= $2)
              AND ($3::timestamptz IS NULL OR recorded_at <= $3)
            ORDER BY recorded_at DESC
            LIMIT $4
            "#,
        )
        .bind(vehicle_id)
        .bind(query.from)
        .bind(query.to)
        .bind(query.effective_limit())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}
