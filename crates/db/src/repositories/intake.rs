use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use orderdesk_core::domain::intake::{Channel, IntakeEvent, IntakeEventId};
use orderdesk_core::domain::OrganizationId;
use orderdesk_core::errors::StoreError;
use orderdesk_core::ports::IntakeEventStore;

use super::{backend, decode};
use crate::DbPool;

pub struct SqlIntakeEventStore {
    pool: DbPool,
}

impl SqlIntakeEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<IntakeEvent, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let channel_str: String = row.try_get("channel").map_err(decode)?;
    let raw_content: String = row.try_get("raw_content").map_err(decode)?;
    let received_at_str: String = row.try_get("received_at").map_err(decode)?;

    let channel = Channel::parse(&channel_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown channel `{channel_str}`")))?;
    let received_at = DateTime::parse_from_rfc3339(&received_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(IntakeEvent {
        id: IntakeEventId(id),
        organization_id: OrganizationId(organization_id),
        channel,
        raw_content,
        received_at,
    })
}

#[async_trait]
impl IntakeEventStore for SqlIntakeEventStore {
    async fn find_by_id(&self, id: &IntakeEventId) -> Result<Option<IntakeEvent>, StoreError> {
        let row = sqlx::query(
            "SELECT id, organization_id, channel, raw_content, received_at
             FROM intake_event WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(ref row) => Ok(Some(row_to_event(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, event: &IntakeEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO intake_event (id, organization_id, channel, raw_content, received_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&event.id.0)
        .bind(&event.organization_id.0)
        .bind(event.channel.as_str())
        .bind(&event.raw_content)
        .bind(event.received_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}
