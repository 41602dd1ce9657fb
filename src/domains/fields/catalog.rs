use crate::domains::fields::types::{DetectedField, FieldType};

type FieldSpec = (&'static str, &'static str, FieldType);

const ISSUE_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("number", "Number", FieldType::Number),
    ("title", "Title", FieldType::String),
    ("state", "State", FieldType::String),
    ("priority", "Priority", FieldType::String),
    ("body", "Body", FieldType::Richtext),
    ("assignee", "Assignee", FieldType::User),
    ("requester", "Requester", FieldType::User),
    ("team", "Team", FieldType::String),
    ("tags", "Tags", FieldType::Array),
    ("csatScore", "CSAT Score", FieldType::Rating),
    ("resolvedAt", "Resolved At", FieldType::Date),
    ("_links", "Links", FieldType::Object),
];

const COMPANY_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("name", "Name", FieldType::String),
    ("domain", "Domain", FieldType::String),
    ("status", "Status", FieldType::String),
    ("owner", "Owner", FieldType::User),
    ("employeeCount", "Employees", FieldType::Number),
    ("tags", "Tags", FieldType::Array),
];

const USER_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("name", "Name", FieldType::String),
    ("email", "Email", FieldType::String),
    ("role", "Role", FieldType::String),
    ("isActive", "Active", FieldType::Boolean),
    ("lastSeenAt", "Last Seen", FieldType::Date),
];

const CONTACT_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("name", "Name", FieldType::String),
    ("email", "Email", FieldType::String),
    ("phone", "Phone", FieldType::String),
    ("company", "Company", FieldType::Object),
    ("tags", "Tags", FieldType::Array),
];

const WORKFLOW_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("name", "Name", FieldType::String),
    ("status", "Status", FieldType::String),
    ("trigger", "Trigger", FieldType::String),
    ("isEnabled", "Enabled", FieldType::Boolean),
    ("runCount", "Runs", FieldType::Number),
    ("actions", "Actions", FieldType::Array),
];

const TEAM_FIELDS: &[FieldSpec] = &[
    ("_id", "ID", FieldType::String),
    ("name", "Name", FieldType::String),
    ("members", "Members", FieldType::Users),
    ("lead", "Lead", FieldType::User),
];

const COMMON_FIELDS: &[FieldSpec] = &[
    ("createdAt", "Created At", FieldType::Date),
    ("updatedAt", "Updated At", FieldType::Date),
];

/// Entity types with a documented field catalog
pub const KNOWN_ENTITY_TYPES: &[&str] = &["issue", "company", "user", "contact", "workflow", "team"];

fn entity_fields(entity_type: &str) -> &'static [FieldSpec] {
    match entity_type {
        "issue" => ISSUE_FIELDS,
        "company" => COMPANY_FIELDS,
        "user" => USER_FIELDS,
        "contact" => CONTACT_FIELDS,
        "workflow" => WORKFLOW_FIELDS,
        "team" => TEAM_FIELDS,
        _ => &[],
    }
}

/// Standard fields for an entity type. Pure; unknown types yield only the
/// common timestamp fields.
pub fn standard_fields(entity_type: &str) -> Vec<DetectedField> {
    entity_fields(entity_type)
        .iter()
        .chain(COMMON_FIELDS.iter())
        .map(|(key, label, field_type)| DetectedField::standard(key, label, *field_type))
        .collect()
}
