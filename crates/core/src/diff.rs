use std::collections::HashSet;

use tracing::warn;

use crate::domain::item::{ItemId, VariantId};
use crate::domain::order::{Order, OrderLine, OrderLineId};
use crate::domain::proposal::LineChangeType;
use crate::snapshot::{CatalogSnapshot, ResolvedLine};

/// One computed change against an order, before it is numbered and
/// persisted as a proposal line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineChange {
    pub change_type: LineChangeType,
    pub item_id: Option<ItemId>,
    pub variant_id: Option<VariantId>,
    pub item_name: String,
    pub order_line_id: Option<OrderLineId>,
    pub quantity: u32,
    pub variant_code: Option<String>,
    pub previous_quantity: Option<u32>,
    pub previous_variant_code: Option<String>,
    pub unmatched: bool,
}

/// Computes the minimal add/modify/remove set between an order's active
/// lines and the requested lines.
///
/// The one hard invariant: an active line not mentioned in the request is
/// left untouched. A `remove` exists only where the extraction flagged an
/// explicit removal directive; silence never deletes anything.
pub fn diff_order_lines(
    order: &Order,
    requested: &[ResolvedLine],
    snapshot: &CatalogSnapshot,
) -> Vec<LineChange> {
    let active = order.active_lines();
    let mut consumed: HashSet<OrderLineId> = HashSet::new();
    let mut changes = Vec::new();

    for line in requested {
        if line.remove {
            match take_match(&active, &mut consumed, line) {
                Some(existing) => changes.push(removal(existing, snapshot)),
                None => {
                    warn!(
                        event_name = "diff.removal_without_target",
                        order_id = %order.id.0,
                        item = %line.item_name,
                        "removal directive names an item with no active line; nothing to remove"
                    );
                }
            }
            continue;
        }

        if line.unmatched {
            // No catalog identity to match on; surface as an add needing
            // reviewer correction.
            changes.push(addition(line));
            continue;
        }

        match take_match(&active, &mut consumed, line) {
            Some(existing) => {
                let quantity_changed = existing.quantity != line.quantity;
                let variant_changed =
                    line.variant_id.is_some() && line.variant_id != existing.variant_id;

                if !quantity_changed && !variant_changed {
                    continue;
                }

                changes.push(modification(existing, line, variant_changed, snapshot));
            }
            None => changes.push(addition(line)),
        }
    }

    changes
}

/// Finds the active line a request targets, consuming it so no existing
/// line backs two changes. Exact (item, variant) matches win over
/// item-only matches.
fn take_match<'a>(
    active: &[&'a OrderLine],
    consumed: &mut HashSet<OrderLineId>,
    line: &ResolvedLine,
) -> Option<&'a OrderLine> {
    let item_id = line.item_id.as_ref()?;

    let same_item = || {
        active
            .iter()
            .filter(|candidate| !consumed.contains(&candidate.id))
            .filter(|candidate| candidate.item_id.as_ref() == Some(item_id))
    };

    let found = line
        .variant_id
        .as_ref()
        .and_then(|variant_id| {
            same_item().find(|candidate| candidate.variant_id.as_ref() == Some(variant_id)).copied()
        })
        .or_else(|| same_item().next().copied())?;

    consumed.insert(found.id.clone());
    Some(found)
}

fn addition(line: &ResolvedLine) -> LineChange {
    LineChange {
        change_type: LineChangeType::Add,
        item_id: line.item_id.clone(),
        variant_id: line.variant_id.clone(),
        item_name: line.item_name.clone(),
        order_line_id: None,
        quantity: line.quantity,
        variant_code: line.variant_code.clone(),
        previous_quantity: None,
        previous_variant_code: None,
        unmatched: line.unmatched,
    }
}

fn modification(
    existing: &OrderLine,
    line: &ResolvedLine,
    variant_changed: bool,
    snapshot: &CatalogSnapshot,
) -> LineChange {
    // A quantity-only request preserves the existing variant; it is never
    // cleared by omission.
    let (variant_id, variant_code) = if variant_changed {
        (line.variant_id.clone(), line.variant_code.clone())
    } else {
        (existing.variant_id.clone(), existing_variant_code(existing, snapshot))
    };

    LineChange {
        change_type: LineChangeType::Modify,
        item_id: existing.item_id.clone(),
        variant_id,
        item_name: existing.product_name.clone(),
        order_line_id: Some(existing.id.clone()),
        quantity: line.quantity,
        variant_code,
        previous_quantity: Some(existing.quantity),
        previous_variant_code: existing_variant_code(existing, snapshot),
        unmatched: false,
    }
}

fn removal(existing: &OrderLine, snapshot: &CatalogSnapshot) -> LineChange {
    LineChange {
        change_type: LineChangeType::Remove,
        item_id: existing.item_id.clone(),
        variant_id: existing.variant_id.clone(),
        item_name: existing.product_name.clone(),
        order_line_id: Some(existing.id.clone()),
        quantity: existing.quantity,
        variant_code: existing_variant_code(existing, snapshot),
        previous_quantity: Some(existing.quantity),
        previous_variant_code: existing_variant_code(existing, snapshot),
        unmatched: false,
    }
}

fn existing_variant_code(existing: &OrderLine, snapshot: &CatalogSnapshot) -> Option<String> {
    match (&existing.item_id, &existing.variant_id) {
        (Some(item_id), Some(variant_id)) => snapshot.variant_code(item_id, variant_id),
        _ => None,
    }
}
