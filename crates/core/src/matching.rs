use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::customer::CustomerId;
use crate::domain::order::{Order, OrderId};
use crate::domain::OrganizationId;
use crate::errors::StoreError;
use crate::ports::OrderStore;

/// Bounds on candidate-order fetches. Kept small: the oracle prompt carries
/// every candidate, and a change request almost always targets an order
/// within a delivery cycle of today.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchLimits {
    pub upcoming: u32,
    pub recent: u32,
    pub organization_scan: u32,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self { upcoming: 5, recent: 3, organization_scan: 20 }
    }
}

/// Candidate orders for one date-group, ordered by proximity to today.
/// An empty set is a normal outcome driving the NEW_ORDER path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateOrders {
    pub upcoming: Vec<Order>,
    pub recent: Vec<Order>,
}

impl CandidateOrders {
    /// The exact-date rule: an upcoming order on the target date is the
    /// deterministic match and must never be overridden with NEW_ORDER.
    pub fn exact_date_match(&self, date: NaiveDate) -> Option<&Order> {
        self.upcoming.iter().find(|order| order.delivery_date == date)
    }

    pub fn find(&self, id: &OrderId) -> Option<&Order> {
        self.upcoming.iter().chain(self.recent.iter()).find(|order| &order.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty() && self.recent.is_empty()
    }
}

/// Finds the existing orders a change/cancel request could target.
pub struct OrderMatcher {
    store: Arc<dyn OrderStore>,
    limits: MatchLimits,
}

impl OrderMatcher {
    pub fn new(store: Arc<dyn OrderStore>, limits: MatchLimits) -> Self {
        Self { store, limits }
    }

    /// With a known customer, fetch their bounded upcoming and recent-past
    /// orders. Without one, fall back to a bounded organization-wide scan
    /// of upcoming orders so name-based binding can be attempted
    /// downstream.
    pub async fn candidates(
        &self,
        organization_id: &OrganizationId,
        customer_id: Option<&CustomerId>,
        today: NaiveDate,
    ) -> Result<CandidateOrders, StoreError> {
        match customer_id {
            Some(customer_id) => {
                let upcoming = self
                    .store
                    .upcoming_for_customer(
                        organization_id,
                        customer_id,
                        today,
                        self.limits.upcoming,
                    )
                    .await?;
                let recent = self
                    .store
                    .recent_for_customer(organization_id, customer_id, today, self.limits.recent)
                    .await?;
                Ok(CandidateOrders { upcoming, recent })
            }
            None => {
                let upcoming = self
                    .store
                    .upcoming_for_organization(organization_id, today, self.limits.organization_scan)
                    .await?;
                Ok(CandidateOrders { upcoming, recent: Vec::new() })
            }
        }
    }
}
