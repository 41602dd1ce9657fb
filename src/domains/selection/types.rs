use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The three independently persisted kinds of column customization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    FieldSelections,
    ColumnOrder,
    ColumnWidths,
}

impl SelectionKind {
    pub const ALL: [SelectionKind; 3] = [
        SelectionKind::FieldSelections,
        SelectionKind::ColumnOrder,
        SelectionKind::ColumnWidths,
    ];

    pub fn key_prefix(&self) -> &'static str {
        match self {
            SelectionKind::FieldSelections => "field-selections",
            SelectionKind::ColumnOrder => "column-order",
            SelectionKind::ColumnWidths => "column-widths",
        }
    }

    /// `<kind>-<entityType>[-<tenantSlug>]`; without a tenant this is the global key.
    pub fn storage_key(&self, entity_type: &str, tenant_slug: Option<&str>) -> String {
        match tenant_slug {
            Some(tenant) => format!("{}-{}-{}", self.key_prefix(), entity_type, tenant),
            None => format!("{}-{}", self.key_prefix(), entity_type),
        }
    }

    /// Whether `key` belongs to `entity_type` for this kind, any tenant or global.
    ///
    /// Keys do not delimit the entity from the tenant, so a hyphenated entity
    /// type such as `user-profile` is indistinguishable from entity `user`
    /// with tenant `profile` and matches `user` as well.
    pub fn matches_entity(&self, key: &str, entity_type: &str) -> bool {
        let base = format!("{}-{}", self.key_prefix(), entity_type);
        key == base || key.strip_prefix(&base).is_some_and(|rest| rest.starts_with('-'))
    }

    pub fn matches_any(key: &str) -> bool {
        Self::ALL
            .iter()
            .any(|kind| key.starts_with(&format!("{}-", kind.key_prefix())))
    }
}

/// One saved include/exclude decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelection {
    pub key: String,
    pub include: bool,
}

/// Persisted inclusion list for an entity type and tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub selections: Vec<FieldSelection>,
}

/// Persisted column order (field keys, first column first)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOrderState {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub column_order: Vec<String>,
}

/// Persisted column widths in pixels, by field key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnWidthState {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub column_widths: HashMap<String, u32>,
}

/// Granularity of a reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// One entity type for one tenant
    Tenant {
        entity_type: String,
        tenant_slug: String,
    },
    /// Every tenant and the global state for one entity type. Also covers
    /// any entity type that extends it with a hyphen, see
    /// [`SelectionKind::matches_entity`].
    EntityType(String),
    /// Every column-width, column-order and field-selection key
    All,
}
