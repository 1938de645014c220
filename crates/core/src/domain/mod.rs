use serde::{Deserialize, Serialize};

pub mod customer;
pub mod events;
pub mod intake;
pub mod item;
pub mod order;
pub mod proposal;

/// Tenant boundary for every record in the system. Catalog, orders, and
/// proposals never cross organizations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);
