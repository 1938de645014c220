use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::item::ItemId;
use crate::domain::proposal::OrderFrequency;

/// One candidate order line produced by the extraction oracle. Transient;
/// never persisted directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLineItem {
    pub item_id: Option<ItemId>,
    pub variant_code: Option<String>,
    pub quantity: u32,
    /// Per-line delivery date; falls back to the message-level default.
    pub delivery_date: Option<NaiveDate>,
    /// Set only when the message contains an explicit removal directive
    /// naming this item. The diff engine never infers removal otherwise.
    #[serde(default)]
    pub remove: bool,
    /// The customer's own wording, kept for unmatched references.
    #[serde(default)]
    pub raw_text: Option<String>,
}

/// Full structured output of one oracle extraction call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    #[serde(default)]
    pub line_items: Vec<ExtractedLineItem>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub requested_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub order_frequency: OrderFrequency,
    #[serde(default)]
    pub cancel_dates: Vec<NaiveDate>,
}

impl Default for ExtractionOutcome {
    fn default() -> Self {
        Self {
            line_items: Vec::new(),
            customer_id: None,
            requested_delivery_date: None,
            order_frequency: OrderFrequency::OneTime,
            cancel_dates: Vec::new(),
        }
    }
}
