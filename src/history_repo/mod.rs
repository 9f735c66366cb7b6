// SQLite event journal. One row per device event; the event itself is stored as JSON.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use crate::models::{DeviceEvent, EventEnvelope};

pub struct HistoryRepo {
    pool: SqlitePool,
    retention_ms: i64,
}

impl HistoryRepo {
    pub async fn connect(path: &str, max_pool_size: u32, retention_days: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        let retention_ms = (retention_days as i64) * 24 * 60 * 60 * 1000;
        Ok(Self { pool, retention_ms })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_device_created ON device_events(device_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, events), fields(repo = "history", operation = "save_events", events_count = events.len()))]
    pub async fn save_events(&self, events: &[EventEnvelope]) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for e in events {
            let payload = serde_json::to_string(&e.event)?;
            sqlx::query(
                "INSERT INTO device_events (device_id, created_at, kind, payload) VALUES ($1, $2, $3, $4)",
            )
            .bind(&e.device_id)
            .bind(e.created_at.timestamp_millis())
            .bind(e.event.kind())
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "history", operation = "prune_old_data"))]
    pub async fn prune_old_data(&self) -> anyhow::Result<u64> {
        let cutoff = Utc::now().timestamp_millis() - self.retention_ms;
        let result = sqlx::query("DELETE FROM device_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Latest `limit` events of one device, oldest first.
    #[instrument(skip(self), fields(repo = "history", operation = "get_recent_events"))]
    pub async fn get_recent_events(
        &self,
        device_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            "SELECT device_id, created_at, payload FROM device_events
             WHERE device_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(device_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_event_row(&row)?);
        }
        out.reverse();
        Ok(out)
    }

    fn parse_event_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<EventEnvelope> {
        let device_id: String = row.try_get("device_id")?;
        let created_at: i64 = row.try_get("created_at")?;
        let payload: String = row.try_get("payload")?;
        let event: DeviceEvent = serde_json::from_str(&payload)?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_at)
            .ok_or_else(|| anyhow::anyhow!("created_at out of range: {}", created_at))?;
        Ok(EventEnvelope {
            device_id,
            created_at,
            event,
        })
    }
}
