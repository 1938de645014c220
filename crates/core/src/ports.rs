use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::events::OrderEvent;
use crate::domain::intake::{IntakeEvent, IntakeEventId};
use crate::domain::item::Item;
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::proposal::{Proposal, ProposalId, ProposalLine};
use crate::domain::OrganizationId;
use crate::errors::StoreError;
use crate::snapshot::CatalogSnapshot;

/// Read-only access to one organization's customers and item catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<CatalogSnapshot, StoreError>;
}

/// The order ledger. Query methods exclude cancelled orders and return
/// results ordered by proximity to the pivot date. Writes are reserved for
/// the resolution engine, plus the pipeline's `pending_review` soft lock.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn upcoming_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError>;

    async fn recent_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        before: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError>;

    async fn upcoming_for_organization(
        &self,
        organization_id: &OrganizationId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError>;

    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError>;

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, StoreError>;
}

/// Proposal persistence. `create` writes the proposal and its lines as one
/// logical unit and enforces at most one proposal per
/// (intake event, delivery-date group).
#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError>;

    async fn count_for_intake_event(
        &self,
        intake_event_id: &IntakeEventId,
    ) -> Result<u64, StoreError>;

    async fn create(&self, proposal: &Proposal, lines: &[ProposalLine]) -> Result<(), StoreError>;

    async fn lines_for_proposal(
        &self,
        proposal_id: &ProposalId,
    ) -> Result<Vec<ProposalLine>, StoreError>;

    async fn save(&self, proposal: &Proposal) -> Result<(), StoreError>;
}

/// Intake event persistence. Events are written by the intake surface; the
/// pipeline only reads them.
#[async_trait]
pub trait IntakeEventStore: Send + Sync {
    async fn find_by_id(&self, id: &IntakeEventId) -> Result<Option<IntakeEvent>, StoreError>;

    async fn save(&self, event: &IntakeEvent) -> Result<(), StoreError>;
}

/// In-memory catalog store for tests and the scripted CLI path.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    customers: RwLock<Vec<Customer>>,
    items: RwLock<Vec<Item>>,
}

impl InMemoryCatalogStore {
    pub fn new(customers: Vec<Customer>, items: Vec<Item>) -> Self {
        Self { customers: RwLock::new(customers), items: RwLock::new(items) }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn load_snapshot(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<CatalogSnapshot, StoreError> {
        let customers = self.customers.read().await;
        let items = self.items.read().await;

        Ok(CatalogSnapshot::new(
            organization_id.clone(),
            customers
                .iter()
                .filter(|customer| &customer.organization_id == organization_id)
                .cloned()
                .collect(),
            items
                .iter()
                .filter(|item| &item.organization_id == organization_id)
                .cloned()
                .collect(),
        ))
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
    events: RwLock<Vec<OrderEvent>>,
}

impl InMemoryOrderStore {
    pub async fn insert(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
    }

    fn matching<'a>(
        orders: impl Iterator<Item = &'a Order>,
        organization_id: &OrganizationId,
        customer_id: Option<&CustomerId>,
    ) -> Vec<Order> {
        orders
            .filter(|order| &order.organization_id == organization_id)
            .filter(|order| order.status != OrderStatus::Cancelled)
            .filter(|order| match customer_id {
                Some(customer_id) => order.customer_id.as_ref() == Some(customer_id),
                None => true,
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn upcoming_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut upcoming = Self::matching(orders.values(), organization_id, Some(customer_id));
        upcoming.retain(|order| order.delivery_date >= on_or_after);
        upcoming.sort_by_key(|order| order.delivery_date);
        upcoming.truncate(limit as usize);
        Ok(upcoming)
    }

    async fn recent_for_customer(
        &self,
        organization_id: &OrganizationId,
        customer_id: &CustomerId,
        before: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut recent = Self::matching(orders.values(), organization_id, Some(customer_id));
        recent.retain(|order| order.delivery_date < before);
        recent.sort_by_key(|order| std::cmp::Reverse(order.delivery_date));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn upcoming_for_organization(
        &self,
        organization_id: &OrganizationId,
        on_or_after: NaiveDate,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut upcoming = Self::matching(orders.values(), organization_id, None);
        upcoming.retain(|order| order.delivery_date >= on_or_after);
        upcoming.sort_by_key(|order| order.delivery_date);
        upcoming.truncate(limit as usize);
        Ok(upcoming)
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order.clone());
        Ok(())
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        events.push(event.clone());
        Ok(())
    }

    async fn events_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| &event.order_id == order_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryProposalStore {
    proposals: RwLock<HashMap<String, Proposal>>,
    lines: RwLock<HashMap<String, Vec<ProposalLine>>>,
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, StoreError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.get(&id.0).cloned())
    }

    async fn count_for_intake_event(
        &self,
        intake_event_id: &IntakeEventId,
    ) -> Result<u64, StoreError> {
        let proposals = self.proposals.read().await;
        Ok(proposals
            .values()
            .filter(|proposal| &proposal.intake_event_id == intake_event_id)
            .count() as u64)
    }

    async fn create(&self, proposal: &Proposal, lines: &[ProposalLine]) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;

        // Mirrors the storage-level unique index on
        // (intake_event_id, delivery date group).
        let duplicate = proposals.values().any(|existing| {
            existing.intake_event_id == proposal.intake_event_id
                && existing.delivery_date == proposal.delivery_date
        });
        if duplicate {
            return Err(StoreError::Backend(format!(
                "proposal already exists for intake event {} on this delivery date",
                proposal.intake_event_id.0
            )));
        }

        proposals.insert(proposal.id.0.clone(), proposal.clone());
        let mut all_lines = self.lines.write().await;
        all_lines.insert(proposal.id.0.clone(), lines.to_vec());
        Ok(())
    }

    async fn lines_for_proposal(
        &self,
        proposal_id: &ProposalId,
    ) -> Result<Vec<ProposalLine>, StoreError> {
        let lines = self.lines.read().await;
        Ok(lines.get(&proposal_id.0).cloned().unwrap_or_default())
    }

    async fn save(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id.0.clone(), proposal.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryIntakeEventStore {
    events: RwLock<HashMap<String, IntakeEvent>>,
}

#[async_trait]
impl IntakeEventStore for InMemoryIntakeEventStore {
    async fn find_by_id(&self, id: &IntakeEventId) -> Result<Option<IntakeEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events.get(&id.0).cloned())
    }

    async fn save(&self, event: &IntakeEvent) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        events.insert(event.id.0.clone(), event.clone());
        Ok(())
    }
}
