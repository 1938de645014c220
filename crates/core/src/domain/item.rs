use serde::{Deserialize, Serialize};

use crate::domain::OrganizationId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVariant {
    pub id: VariantId,
    pub code: String,
    pub name: String,
    pub notes: Option<String>,
}

/// A sellable catalog item with its size/packaging variants. Read-only to
/// the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub organization_id: OrganizationId,
    pub sku: String,
    pub name: String,
    pub variants: Vec<ItemVariant>,
}

impl Item {
    pub fn variant_by_code(&self, code: &str) -> Option<&ItemVariant> {
        let code = code.trim();
        self.variants.iter().find(|variant| variant.code.eq_ignore_ascii_case(code))
    }

    pub fn variant_by_id(&self, id: &VariantId) -> Option<&ItemVariant> {
        self.variants.iter().find(|variant| &variant.id == id)
    }
}
