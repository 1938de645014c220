use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tera::Tera;

use orderdesk_core::domain::order::Order;
use orderdesk_core::domain::OrganizationId;
use orderdesk_core::oracle::{ClassificationRequest, ExtractionRequest};

/// Organization-specific prompt wording behind one interface, so the intent
/// resolver and diff engine never see per-customer phrasing. Most
/// organizations use the default profile; a registry entry overrides it.
pub trait ExtractionProfile: Send + Sync {
    fn render_extraction(&self, request: &ExtractionRequest<'_>) -> tera::Result<String>;
    fn render_classification(&self, request: &ClassificationRequest<'_>) -> tera::Result<String>;
}

pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<dyn ExtractionProfile>>,
    default_profile: Arc<dyn ExtractionProfile>,
}

impl ProfileRegistry {
    pub fn new(default_profile: Arc<dyn ExtractionProfile>) -> Self {
        Self { profiles: HashMap::new(), default_profile }
    }

    pub fn register(
        &mut self,
        organization_id: OrganizationId,
        profile: Arc<dyn ExtractionProfile>,
    ) {
        self.profiles.insert(organization_id.0, profile);
    }

    pub fn for_organization(&self, organization_id: &OrganizationId) -> Arc<dyn ExtractionProfile> {
        self.profiles
            .get(&organization_id.0)
            .cloned()
            .unwrap_or_else(|| self.default_profile.clone())
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new(Arc::new(DefaultProfile::new().expect("built-in templates are valid")))
    }
}

const EXTRACTION_TEMPLATE: &str = r#"You turn a customer's raw message into structured order lines.

Message ({{ channel }}):
{{ message }}

Catalog items:
{% for item in items %}- {{ item.id }} ({{ item.sku }}): {{ item.name }}, variants: {{ item.variants | join(sep=", ") }}
{% endfor %}
Customers:
{% for customer in customers %}- {{ customer.id }}: {{ customer.name }}
{% endfor %}
Existing upcoming orders:
{% for order in orders %}- {{ order.id }} for {{ order.customer_name }} on {{ order.delivery_date }}: {{ order.lines | join(sep="; ") }}
{% endfor %}
Respond with only a JSON object:
{"line_items": [{"item_id": "...", "variant_code": "...", "quantity": 1, "delivery_date": "YYYY-MM-DD", "remove": false, "raw_text": "..."}],
 "customer_id": "...", "requested_delivery_date": "YYYY-MM-DD", "order_frequency": "one_time", "cancel_dates": []}

Mark `remove: true` only when the message explicitly asks to remove that named item. Use null for anything the message does not state."#;

const CLASSIFICATION_TEMPLATE: &str = r#"Classify the intent of this request for the delivery date {{ date }}.

Message:
{{ message }}

Requested lines for this date:
{% for line in lines %}- {{ line }}
{% endfor %}
Candidate orders:
{% for order in candidates %}- {{ order.id }} for {{ order.customer_name }} on {{ order.delivery_date }}: {{ order.lines | join(sep="; ") }}
{% endfor %}
Rules:
- Removing a specifically named item is always change_order.
- An unqualified request to cancel "the order" or "everything", with no item named, is cancel_order.

Respond with only a JSON object:
{"intent": "new_order|change_order|cancel_order|unknown", "matched_order_id": null, "confidence": 0.0, "reasoning": "..."}"#;

#[derive(Serialize)]
struct ItemSummary {
    id: String,
    sku: String,
    name: String,
    variants: Vec<String>,
}

#[derive(Serialize)]
struct CustomerSummary {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct OrderSummary {
    id: String,
    customer_name: String,
    delivery_date: String,
    lines: Vec<String>,
}

fn order_summary(order: &Order) -> OrderSummary {
    OrderSummary {
        id: order.id.0.clone(),
        customer_name: order.customer_name.clone(),
        delivery_date: order.delivery_date.to_string(),
        lines: order
            .active_lines()
            .iter()
            .map(|line| format!("{} x{}", line.product_name, line.quantity))
            .collect(),
    }
}

pub struct DefaultProfile {
    tera: Tera,
}

impl DefaultProfile {
    pub fn new() -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("extraction", EXTRACTION_TEMPLATE)?;
        tera.add_raw_template("classification", CLASSIFICATION_TEMPLATE)?;
        Ok(Self { tera })
    }
}

impl ExtractionProfile for DefaultProfile {
    fn render_extraction(&self, request: &ExtractionRequest<'_>) -> tera::Result<String> {
        let items: Vec<ItemSummary> = request
            .snapshot
            .items()
            .map(|item| ItemSummary {
                id: item.id.0.clone(),
                sku: item.sku.clone(),
                name: item.name.clone(),
                variants: item
                    .variants
                    .iter()
                    .map(|variant| format!("{} ({})", variant.code, variant.name))
                    .collect(),
            })
            .collect();
        let customers: Vec<CustomerSummary> = request
            .snapshot
            .customers()
            .map(|customer| CustomerSummary {
                id: customer.id.0.clone(),
                name: customer.name.clone(),
            })
            .collect();
        let orders: Vec<OrderSummary> =
            request.existing_orders.iter().map(order_summary).collect();

        let mut context = tera::Context::new();
        context.insert("channel", request.event.channel.as_str());
        context.insert("message", &request.event.raw_content);
        context.insert("items", &items);
        context.insert("customers", &customers);
        context.insert("orders", &orders);
        self.tera.render("extraction", &context)
    }

    fn render_classification(&self, request: &ClassificationRequest<'_>) -> tera::Result<String> {
        let lines: Vec<String> = request
            .group
            .lines
            .iter()
            .map(|line| {
                let subject = line
                    .item_id
                    .as_ref()
                    .map(|id| id.0.clone())
                    .or_else(|| line.raw_text.clone())
                    .unwrap_or_else(|| "unspecified item".to_string());
                if line.remove {
                    format!("remove {subject}")
                } else {
                    format!("{subject} x{}", line.quantity)
                }
            })
            .collect();
        let candidates: Vec<OrderSummary> = request
            .candidates
            .upcoming
            .iter()
            .chain(request.candidates.recent.iter())
            .map(order_summary)
            .collect();

        let mut context = tera::Context::new();
        context.insert("message", request.raw_text);
        context.insert(
            "date",
            &request
                .group
                .date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "unspecified".to_string()),
        );
        context.insert("lines", &lines);
        context.insert("candidates", &candidates);
        self.tera.render("classification", &context)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use orderdesk_core::domain::customer::{Customer, CustomerId};
    use orderdesk_core::domain::intake::{Channel, IntakeEvent, IntakeEventId};
    use orderdesk_core::domain::item::{Item, ItemId, ItemVariant, VariantId};
    use orderdesk_core::domain::OrganizationId;
    use orderdesk_core::oracle::ExtractionRequest;
    use orderdesk_core::snapshot::CatalogSnapshot;

    use super::{DefaultProfile, ExtractionProfile, ProfileRegistry};

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(
            OrganizationId("org-1".to_string()),
            vec![Customer {
                id: CustomerId("cust-bistro".to_string()),
                organization_id: OrganizationId("org-1".to_string()),
                name: "Blue Door Bistro".to_string(),
                contact_email: None,
                contact_phone: None,
                notes: None,
                item_notes: Default::default(),
            }],
            vec![Item {
                id: ItemId("item-shiso".to_string()),
                organization_id: OrganizationId("org-1".to_string()),
                sku: "SHI-001".to_string(),
                name: "Shiso Green".to_string(),
                variants: vec![ItemVariant {
                    id: VariantId("item-shiso-l".to_string()),
                    code: "L".to_string(),
                    name: "Large".to_string(),
                    notes: None,
                }],
            }],
        )
    }

    #[test]
    fn extraction_prompt_carries_message_catalog_and_rules() {
        let profile = DefaultProfile::new().expect("profile");
        let snapshot = snapshot();
        let event = IntakeEvent {
            id: IntakeEventId("intake-1".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            channel: Channel::Sms,
            raw_content: "add 2 large shiso green".to_string(),
            received_at: Utc::now(),
        };

        let prompt = profile
            .render_extraction(&ExtractionRequest {
                event: &event,
                snapshot: &snapshot,
                existing_orders: &[],
            })
            .expect("render");

        assert!(prompt.contains("add 2 large shiso green"));
        assert!(prompt.contains("item-shiso"));
        assert!(prompt.contains("Blue Door Bistro"));
        assert!(prompt.contains("remove: true"));
    }

    #[test]
    fn registry_falls_back_to_the_default_profile() {
        struct Marker;
        impl ExtractionProfile for Marker {
            fn render_extraction(
                &self,
                _request: &orderdesk_core::oracle::ExtractionRequest<'_>,
            ) -> tera::Result<String> {
                Ok("marker".to_string())
            }
            fn render_classification(
                &self,
                _request: &orderdesk_core::oracle::ClassificationRequest<'_>,
            ) -> tera::Result<String> {
                Ok("marker".to_string())
            }
        }

        let mut registry = ProfileRegistry::default();
        registry.register(OrganizationId("org-special".to_string()), Arc::new(Marker));

        let snapshot = snapshot();
        let event = IntakeEvent {
            id: IntakeEventId("intake-1".to_string()),
            organization_id: OrganizationId("org-special".to_string()),
            channel: Channel::Email,
            raw_content: "hello".to_string(),
            received_at: Utc::now(),
        };
        let request =
            ExtractionRequest { event: &event, snapshot: &snapshot, existing_orders: &[] };

        let special = registry
            .for_organization(&OrganizationId("org-special".to_string()))
            .render_extraction(&request)
            .expect("render");
        assert_eq!(special, "marker");

        let fallback = registry
            .for_organization(&OrganizationId("org-other".to_string()))
            .render_extraction(&request)
            .expect("render");
        assert!(fallback.contains("hello"));
    }
}
