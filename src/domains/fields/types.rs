use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed set of field types understood by table rendering and export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Richtext,
    Rating,
    User,
    Users,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Richtext => "richtext",
            FieldType::Rating => "rating",
            FieldType::User => "user",
            FieldType::Users => "users",
        }
    }

    /// Default column width in pixels for this type
    pub fn default_width(&self) -> u32 {
        match self {
            FieldType::Boolean => 80,
            FieldType::Number | FieldType::Rating => 100,
            FieldType::Date => 120,
            FieldType::String | FieldType::Richtext => 200,
            FieldType::User | FieldType::Users => 150,
            FieldType::Array | FieldType::Object => 250,
        }
    }

    /// Map the vendor's custom-field type vocabulary onto the internal enum.
    /// Unknown vendor types fall back to `String`.
    pub fn from_vendor(vendor_type: &str) -> Self {
        match vendor_type.to_ascii_lowercase().as_str() {
            "number" | "decimal" | "currency" | "integer" => FieldType::Number,
            "checkbox" | "boolean" => FieldType::Boolean,
            "date" | "datetime" => FieldType::Date,
            "multiselect" => FieldType::Array,
            "richtext" | "textarea" => FieldType::Richtext,
            "rating" => FieldType::Rating,
            "teammember" => FieldType::User,
            "teammembers" => FieldType::Users,
            _ => FieldType::String,
        }
    }
}

/// Which of the three sources produced a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSource {
    Standard,
    Custom,
    Discovered,
}

/// Tenant custom-field definition as returned by the configuration endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl CustomFieldConfig {
    pub fn is_visible(&self) -> bool {
        self.is_active && !self.is_hidden.unwrap_or(false)
    }
}

/// A field produced by one detection source. `key` is unique within a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub source: FieldSource,
    pub is_standard: bool,
    pub is_custom: bool,
    pub is_discovered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field_config: Option<CustomFieldConfig>,
}

impl DetectedField {
    pub fn standard(key: &str, label: &str, field_type: FieldType) -> Self {
        Self::with_source(key.to_string(), label.to_string(), field_type, FieldSource::Standard)
    }

    pub fn custom(config: CustomFieldConfig) -> Self {
        let mut field = Self::with_source(
            format!("custom.{}", config.name),
            config.name.clone(),
            FieldType::from_vendor(&config.field_type),
            FieldSource::Custom,
        );
        field.custom_field_config = Some(config);
        field
    }

    pub fn discovered(key: String, field_type: FieldType) -> Self {
        let label = humanize_key(&key);
        Self::with_source(key, label, field_type, FieldSource::Discovered)
    }

    fn with_source(key: String, label: String, field_type: FieldType, source: FieldSource) -> Self {
        Self {
            key,
            label,
            field_type,
            source,
            is_standard: source == FieldSource::Standard,
            is_custom: source == FieldSource::Custom,
            is_discovered: source == FieldSource::Discovered,
            custom_field_config: None,
        }
    }

    /// Whether this field is exported/shown before any user customization.
    pub fn default_include(&self) -> bool {
        if matches!(self.key.as_str(), "_id" | "name" | "title") {
            return true;
        }
        match self.source {
            FieldSource::Standard => !self.key.starts_with('_'),
            FieldSource::Custom => true,
            FieldSource::Discovered => false,
        }
    }
}

/// Turn `company.accountOwner` into `Company Account Owner`.
fn humanize_key(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    let mut capitalize = true;
    let mut prev_lower = false;
    for c in key.chars() {
        if c == '.' || c == '_' || c == '-' {
            if !label.is_empty() && !label.ends_with(' ') {
                label.push(' ');
            }
            capitalize = true;
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            label.push(' ');
        }
        if capitalize {
            label.extend(c.to_uppercase());
            capitalize = false;
        } else {
            label.push(c);
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    label.trim_end().to_string()
}

/// Persisted, user-customizable projection of a detected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub include: bool,
    pub order: usize,
    pub width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field_config: Option<CustomFieldConfig>,
}

impl FieldMapping {
    pub fn from_detected(field: &DetectedField, order: usize) -> Self {
        Self {
            key: field.key.clone(),
            label: field.label.clone(),
            field_type: field.field_type,
            include: field.default_include(),
            order,
            width: field.field_type.default_width(),
            custom_field_config: field.custom_field_config.clone(),
        }
    }
}

/// Output of one detection cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDetectionResult {
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    /// Detected fields in source priority order: standard, custom, discovered
    pub fields: Vec<DetectedField>,
    /// Field mappings after persisted selection, order and width were applied
    pub mappings: Vec<FieldMapping>,
    pub standard_count: usize,
    pub custom_count: usize,
    pub discovered_count: usize,
    pub detected_at: DateTime<Utc>,
}

impl FieldDetectionResult {
    /// A stale result should be refetched but remains usable.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        let age = now.signed_duration_since(self.detected_at);
        match chrono::Duration::from_std(stale_after) {
            Ok(window) => age >= window,
            Err(_) => false,
        }
    }

    pub fn included_mappings(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter().filter(|m| m.include)
    }
}
