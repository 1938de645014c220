use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use orderdesk_core::domain::customer::CustomerId;
use orderdesk_core::domain::intake::IntakeEventId;
use orderdesk_core::domain::item::{ItemId, VariantId};
use orderdesk_core::domain::order::{OrderId, OrderLineId};
use orderdesk_core::domain::proposal::{
    LineChangeType, OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalLine,
    ProposalLineId, ProposalStatus, ResolutionAudit,
};
use orderdesk_core::domain::OrganizationId;
use orderdesk_core::errors::StoreError;
use orderdesk_core::ports::ProposalStore;

use super::{backend, decode};
use crate::DbPool;

pub struct SqlProposalStore {
    pool: DbPool,
}

impl SqlProposalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROPOSAL_COLUMNS: &str = "id, organization_id, order_id, intake_event_id, kind, status, \
                                order_frequency, customer_id, customer_name, delivery_date, \
                                audit_json, reviewer_notes, reviewed_at, reviewed_by, created_at";

fn row_to_proposal(row: &sqlx::sqlite::SqliteRow) -> Result<Proposal, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode)?;
    let order_id: Option<String> = row.try_get("order_id").map_err(decode)?;
    let intake_event_id: String = row.try_get("intake_event_id").map_err(decode)?;
    let kind_str: String = row.try_get("kind").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let frequency_str: String = row.try_get("order_frequency").map_err(decode)?;
    let customer_id: Option<String> = row.try_get("customer_id").map_err(decode)?;
    let customer_name: Option<String> = row.try_get("customer_name").map_err(decode)?;
    let delivery_date_str: Option<String> = row.try_get("delivery_date").map_err(decode)?;
    let audit_json: Option<String> = row.try_get("audit_json").map_err(decode)?;
    let reviewer_notes: Option<String> = row.try_get("reviewer_notes").map_err(decode)?;
    let reviewed_at_str: Option<String> = row.try_get("reviewed_at").map_err(decode)?;
    let reviewed_by: Option<String> = row.try_get("reviewed_by").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;

    let kind = ProposalKind::parse(&kind_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown proposal kind `{kind_str}`")))?;
    let status = ProposalStatus::parse(&status_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown proposal status `{status_str}`")))?;
    let order_frequency = OrderFrequency::parse(&frequency_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown order frequency `{frequency_str}`")))?;
    let delivery_date = delivery_date_str
        .map(|raw| {
            raw.parse::<NaiveDate>()
                .map_err(|_| StoreError::Decode(format!("invalid delivery_date `{raw}`")))
        })
        .transpose()?;
    let audit: Option<ResolutionAudit> =
        audit_json.map(|raw| serde_json::from_str(&raw).map_err(decode)).transpose()?;
    let reviewed_at = reviewed_at_str
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Proposal {
        id: ProposalId(id),
        organization_id: OrganizationId(organization_id),
        order_id: order_id.map(OrderId),
        intake_event_id: IntakeEventId(intake_event_id),
        kind,
        status,
        order_frequency,
        customer_id: customer_id.map(CustomerId),
        customer_name,
        delivery_date,
        audit,
        reviewer_notes,
        reviewed_at,
        reviewed_by,
        created_at,
    })
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<ProposalLine, StoreError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let proposal_id: String = row.try_get("proposal_id").map_err(decode)?;
    let line_number: i64 = row.try_get("line_number").map_err(decode)?;
    let change_type_str: String = row.try_get("change_type").map_err(decode)?;
    let item_id: Option<String> = row.try_get("item_id").map_err(decode)?;
    let variant_id: Option<String> = row.try_get("variant_id").map_err(decode)?;
    let item_name: String = row.try_get("item_name").map_err(decode)?;
    let order_line_id: Option<String> = row.try_get("order_line_id").map_err(decode)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode)?;
    let variant_code: Option<String> = row.try_get("variant_code").map_err(decode)?;
    let previous_quantity: Option<i64> = row.try_get("previous_quantity").map_err(decode)?;
    let previous_variant_code: Option<String> =
        row.try_get("previous_variant_code").map_err(decode)?;
    let unmatched: i64 = row.try_get("unmatched").map_err(decode)?;

    let change_type = LineChangeType::parse(&change_type_str)
        .ok_or_else(|| StoreError::Decode(format!("unknown change type `{change_type_str}`")))?;

    Ok(ProposalLine {
        id: ProposalLineId(id),
        proposal_id: ProposalId(proposal_id),
        line_number: line_number as u32,
        change_type,
        item_id: item_id.map(ItemId),
        variant_id: variant_id.map(VariantId),
        item_name,
        order_line_id: order_line_id.map(OrderLineId),
        quantity: quantity as u32,
        variant_code,
        previous_quantity: previous_quantity.map(|value| value as u32),
        previous_variant_code,
        unmatched: unmatched != 0,
    })
}

#[async_trait]
impl ProposalStore for SqlProposalStore {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PROPOSAL_COLUMNS} FROM proposal WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref row) => Ok(Some(row_to_proposal(row)?)),
            None => Ok(None),
        }
    }

    async fn count_for_intake_event(
        &self,
        intake_event_id: &IntakeEventId,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM proposal WHERE intake_event_id = ?")
            .bind(&intake_event_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let count: i64 = row.try_get("count").map_err(decode)?;
        Ok(count as u64)
    }

    /// Proposal and lines land in one transaction; the unique index on
    /// (intake_event_id, delivery date) rejects concurrent duplicates.
    async fn create(&self, proposal: &Proposal, lines: &[ProposalLine]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO proposal (id, organization_id, order_id, intake_event_id, kind, status,
                                   order_frequency, customer_id, customer_name, delivery_date,
                                   audit_json, reviewer_notes, reviewed_at, reviewed_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&proposal.id.0)
        .bind(&proposal.organization_id.0)
        .bind(proposal.order_id.as_ref().map(|id| id.0.as_str()))
        .bind(&proposal.intake_event_id.0)
        .bind(proposal.kind.as_str())
        .bind(proposal.status.as_str())
        .bind(proposal.order_frequency.as_str())
        .bind(proposal.customer_id.as_ref().map(|id| id.0.as_str()))
        .bind(proposal.customer_name.as_deref())
        .bind(proposal.delivery_date.map(|date| date.to_string()))
        .bind(
            proposal
                .audit
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(decode)?,
        )
        .bind(proposal.reviewer_notes.as_deref())
        .bind(proposal.reviewed_at.map(|dt| dt.to_rfc3339()))
        .bind(proposal.reviewed_by.as_deref())
        .bind(proposal.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for line in lines {
            sqlx::query(
                "INSERT INTO proposal_line (id, proposal_id, line_number, change_type, item_id,
                                            variant_id, item_name, order_line_id, quantity,
                                            variant_code, previous_quantity,
                                            previous_variant_code, unmatched)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&line.id.0)
            .bind(&line.proposal_id.0)
            .bind(line.line_number)
            .bind(line.change_type.as_str())
            .bind(line.item_id.as_ref().map(|id| id.0.as_str()))
            .bind(line.variant_id.as_ref().map(|id| id.0.as_str()))
            .bind(&line.item_name)
            .bind(line.order_line_id.as_ref().map(|id| id.0.as_str()))
            .bind(line.quantity)
            .bind(line.variant_code.as_deref())
            .bind(line.previous_quantity)
            .bind(line.previous_variant_code.as_deref())
            .bind(i64::from(line.unmatched))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn lines_for_proposal(
        &self,
        proposal_id: &ProposalId,
    ) -> Result<Vec<ProposalLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, proposal_id, line_number, change_type, item_id, variant_id, item_name,
                    order_line_id, quantity, variant_code, previous_quantity,
                    previous_variant_code, unmatched
             FROM proposal_line WHERE proposal_id = ? ORDER BY line_number",
        )
        .bind(&proposal_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_line).collect()
    }

    /// Resolution-time updates only; proposal lines are immutable after
    /// `create`.
    async fn save(&self, proposal: &Proposal) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE proposal SET status = ?, audit_json = ?, reviewer_notes = ?, reviewed_at = ?,
                                 reviewed_by = ?
             WHERE id = ?",
        )
        .bind(proposal.status.as_str())
        .bind(
            proposal
                .audit
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(decode)?,
        )
        .bind(proposal.reviewer_notes.as_deref())
        .bind(proposal.reviewed_at.map(|dt| dt.to_rfc3339()))
        .bind(proposal.reviewed_by.as_deref())
        .bind(&proposal.id.0)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use orderdesk_core::domain::intake::IntakeEventId;
    use orderdesk_core::domain::item::ItemId;
    use orderdesk_core::domain::proposal::{
        LineChangeType, OrderFrequency, Proposal, ProposalId, ProposalKind, ProposalLine,
        ProposalLineId, ProposalStatus, ResolutionAudit,
    };
    use orderdesk_core::domain::OrganizationId;
    use orderdesk_core::ports::ProposalStore;

    use super::SqlProposalStore;
    use crate::{connect_with_settings, fixtures, migrations};

    async fn seeded_store() -> SqlProposalStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed(&pool).await.expect("seed");
        SqlProposalStore::new(pool)
    }

    fn proposal(id: &str, delivery_day: Option<u32>) -> Proposal {
        Proposal {
            id: ProposalId(id.to_string()),
            organization_id: OrganizationId(fixtures::SEED_ORGANIZATION.to_string()),
            order_id: None,
            intake_event_id: IntakeEventId(fixtures::SEED_INTAKE_EVENT.to_string()),
            kind: ProposalKind::NewOrder,
            status: ProposalStatus::Pending,
            order_frequency: OrderFrequency::OneTime,
            customer_id: None,
            customer_name: Some("Blue Door Bistro".to_string()),
            delivery_date: delivery_day
                .map(|day| NaiveDate::from_ymd_opt(2026, 3, day).expect("date")),
            audit: None,
            reviewer_notes: None,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
        }
    }

    fn line(proposal_id: &str, number: u32) -> ProposalLine {
        ProposalLine {
            id: ProposalLineId(format!("{proposal_id}-l{number}")),
            proposal_id: ProposalId(proposal_id.to_string()),
            line_number: number,
            change_type: LineChangeType::Add,
            item_id: Some(ItemId("item-shiso".to_string())),
            variant_id: None,
            item_name: "Shiso Green".to_string(),
            order_line_id: None,
            quantity: 2,
            variant_code: Some("L".to_string()),
            previous_quantity: None,
            previous_variant_code: None,
            unmatched: false,
        }
    }

    #[tokio::test]
    async fn create_and_read_back_proposal_with_lines() {
        let store = seeded_store().await;
        let proposal = proposal("prop-1", Some(6));
        store
            .create(&proposal, &[line("prop-1", 1), line("prop-1", 2)])
            .await
            .expect("create");

        let found = store
            .find_by_id(&ProposalId("prop-1".to_string()))
            .await
            .expect("find")
            .expect("proposal");
        assert_eq!(found.kind, ProposalKind::NewOrder);
        assert_eq!(found.status, ProposalStatus::Pending);
        assert_eq!(found.delivery_date, proposal.delivery_date);

        let lines =
            store.lines_for_proposal(&ProposalId("prop-1".to_string())).await.expect("lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_number, 1);
        assert_eq!(lines[0].item_name, "Shiso Green");
    }

    #[tokio::test]
    async fn unique_index_rejects_a_second_proposal_for_the_same_group() {
        let store = seeded_store().await;
        store.create(&proposal("prop-1", Some(6)), &[]).await.expect("first");

        let error = store
            .create(&proposal("prop-2", Some(6)), &[])
            .await
            .expect_err("duplicate (intake event, date) must be rejected");
        assert!(error.to_string().to_lowercase().contains("unique"));

        // A different delivery-date group under the same event is allowed.
        store.create(&proposal("prop-3", Some(13)), &[]).await.expect("different group");
        // As is a dateless group.
        store.create(&proposal("prop-4", None), &[]).await.expect("dateless group");

        assert_eq!(
            store
                .count_for_intake_event(&IntakeEventId(fixtures::SEED_INTAKE_EVENT.to_string()))
                .await
                .expect("count"),
            3
        );
    }

    #[tokio::test]
    async fn save_updates_resolution_fields_only() {
        let store = seeded_store().await;
        let mut proposal = proposal("prop-1", Some(6));
        store.create(&proposal, &[line("prop-1", 1)]).await.expect("create");

        proposal.accept("reviewer@desk", Utc::now()).expect("accept");
        proposal.audit = Some(ResolutionAudit {
            was_edited: true,
            submitted_line_count: 2,
            proposed_line_count: 1,
        });
        store.save(&proposal).await.expect("save");

        let found = store
            .find_by_id(&ProposalId("prop-1".to_string()))
            .await
            .expect("find")
            .expect("proposal");
        assert_eq!(found.status, ProposalStatus::Accepted);
        assert_eq!(found.reviewed_by.as_deref(), Some("reviewer@desk"));
        assert!(found.reviewed_at.is_some());
        assert_eq!(found.audit.map(|audit| audit.was_edited), Some(true));

        let lines =
            store.lines_for_proposal(&ProposalId("prop-1".to_string())).await.expect("lines");
        assert_eq!(lines.len(), 1, "lines are immutable after create");
    }
}
