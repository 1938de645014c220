use std::collections::HashMap;

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::item::{Item, ItemId, ItemVariant, VariantId};
use crate::domain::OrganizationId;
use crate::extraction::ExtractedLineItem;

/// Immutable view of one organization's customers and catalog, built once
/// per pipeline run and passed by reference through every component. No
/// component mutates it, so runs for different organizations can proceed
/// in parallel without shared state.
pub struct CatalogSnapshot {
    organization_id: OrganizationId,
    customers: HashMap<String, Customer>,
    items: HashMap<String, Item>,
}

/// An extracted line resolved against the snapshot. When the reference has
/// no catalog match the line is kept with `unmatched = true` and a null
/// item id so a reviewer can correct it; it is never dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLine {
    pub item_id: Option<ItemId>,
    pub variant_id: Option<VariantId>,
    pub variant_code: Option<String>,
    pub item_name: String,
    pub quantity: u32,
    pub remove: bool,
    pub unmatched: bool,
}

impl CatalogSnapshot {
    pub fn new(
        organization_id: OrganizationId,
        customers: Vec<Customer>,
        items: Vec<Item>,
    ) -> Self {
        let customers =
            customers.into_iter().map(|customer| (customer.id.0.clone(), customer)).collect();
        let items = items.into_iter().map(|item| (item.id.0.clone(), item)).collect();
        Self { organization_id, customers, items }
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn customer(&self, id: &CustomerId) -> Option<&Customer> {
        self.customers.get(&id.0)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(&id.0)
    }

    pub fn variant(&self, item_id: &ItemId, code: &str) -> Option<&ItemVariant> {
        self.item(item_id).and_then(|item| item.variant_by_code(code))
    }

    pub fn variant_code(&self, item_id: &ItemId, variant_id: &VariantId) -> Option<String> {
        self.item(item_id)
            .and_then(|item| item.variant_by_id(variant_id))
            .map(|variant| variant.code.clone())
    }

    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn resolve_line(&self, line: &ExtractedLineItem) -> ResolvedLine {
        let item = line.item_id.as_ref().and_then(|id| self.item(id));

        let Some(item) = item else {
            return ResolvedLine {
                item_id: None,
                variant_id: None,
                variant_code: line.variant_code.clone(),
                item_name: line
                    .raw_text
                    .clone()
                    .unwrap_or_else(|| "unrecognized item".to_string()),
                quantity: line.quantity,
                remove: line.remove,
                unmatched: true,
            };
        };

        match &line.variant_code {
            Some(code) => match item.variant_by_code(code) {
                Some(variant) => ResolvedLine {
                    item_id: Some(item.id.clone()),
                    variant_id: Some(variant.id.clone()),
                    variant_code: Some(variant.code.clone()),
                    item_name: item.name.clone(),
                    quantity: line.quantity,
                    remove: line.remove,
                    unmatched: false,
                },
                // Item matched but the variant code did not: surface the
                // whole reference for correction rather than guessing.
                None => ResolvedLine {
                    item_id: None,
                    variant_id: None,
                    variant_code: Some(code.clone()),
                    item_name: item.name.clone(),
                    quantity: line.quantity,
                    remove: line.remove,
                    unmatched: true,
                },
            },
            None => ResolvedLine {
                item_id: Some(item.id.clone()),
                variant_id: None,
                variant_code: None,
                item_name: item.name.clone(),
                quantity: line.quantity,
                remove: line.remove,
                unmatched: false,
            },
        }
    }
}
