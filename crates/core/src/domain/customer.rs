use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::item::ItemId;
use crate::domain::OrganizationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// A buying customer. Read-only to the pipeline; ownership lives with the
/// surrounding CRM surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    /// Standing per-item instructions ("always large trays for them").
    pub item_notes: BTreeMap<ItemId, String>,
}
