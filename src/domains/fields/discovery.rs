use crate::domains::fields::types::{DetectedField, FieldType};
use crate::errors::{DomainResult, ValidationError};
use chrono::{Datelike, NaiveDate};
use log::debug;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

/// Default number of sample records inspected per discovery run
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Largest timezone offset accepted in a date string, in minutes
const MAX_OFFSET_MINUTES: u32 = 14 * 60;

fn iso_datetime_regex() -> &'static Regex {
    static ISO_DATETIME_REGEX: OnceLock<Regex> = OnceLock::new();
    ISO_DATETIME_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(?:\.\d{1,6})?(Z|[+-]\d{2}:\d{2})?$").unwrap()
    })
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn offset_is_valid(offset: &str) -> bool {
    if offset == "Z" {
        return true;
    }
    // "-00:00" denotes an unknown local offset and is rejected
    if offset == "-00:00" {
        return false;
    }
    let (Ok(hours), Ok(minutes)) = (offset[1..3].parse::<u32>(), offset[4..6].parse::<u32>()) else {
        return false;
    };
    minutes <= 59 && hours * 60 + minutes <= MAX_OFFSET_MINUTES
}

/// Strict ISO-8601 date-time check: `YYYY-MM-DDTHH:mm:ss[.ffffff](Z|±HH:MM)?`
/// with calendar validation, leap years included.
pub fn is_iso_date_string(value: &str) -> bool {
    let Some(caps) = iso_datetime_regex().captures(value) else {
        return false;
    };

    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let (Some(year), Some(month), Some(day), Some(hour), Some(minute), Some(second)) =
        (number(1), number(2), number(3), number(4), number(5), number(6))
    else {
        return false;
    };
    let year = year as i32;

    if !(1..=12).contains(&month) || hour > 23 || minute > 59 || second > 59 {
        return false;
    }
    if let Some(offset) = caps.get(7) {
        if !offset_is_valid(offset.as_str()) {
            return false;
        }
    }
    if day < 1 || day > days_in_month(year, month) {
        return false;
    }

    // Constructing the calendar date must reproduce the parsed components
    match NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(hour, minute, second)) {
        Some(datetime) => datetime.year() == year && datetime.month() == month && datetime.day() == day,
        None => false,
    }
}

/// Coarse value type observed for a key in one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ValueKind {
    Null,
    Number,
    Boolean,
    Array,
    Object,
    String,
    Date,
}

impl ValueKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(s) if is_iso_date_string(s) => ValueKind::Date,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

#[derive(Debug, Default)]
struct KeyStats {
    occurrences: usize,
    kinds: BTreeSet<ValueKind>,
}

impl KeyStats {
    /// Type precedence: date, number, boolean, array, object (only without any
    /// string occurrence), otherwise string.
    fn resolve_type(&self) -> FieldType {
        let has = |kind| self.kinds.contains(&kind);
        if has(ValueKind::Date) {
            FieldType::Date
        } else if has(ValueKind::Number) {
            FieldType::Number
        } else if has(ValueKind::Boolean) {
            FieldType::Boolean
        } else if has(ValueKind::Array) {
            FieldType::Array
        } else if has(ValueKind::Object) && !has(ValueKind::String) {
            FieldType::Object
        } else {
            FieldType::String
        }
    }
}

/// Accumulates key statistics across sampled records, preserving first-seen order
struct DiscoveryWalk<'a> {
    known: &'a HashSet<&'a str>,
    stats: HashMap<String, KeyStats>,
    order: Vec<String>,
}

impl<'a> DiscoveryWalk<'a> {
    fn visit_record(&mut self, record: &Map<String, Value>) {
        self.visit_object(record, None);
    }

    fn visit_object(&mut self, object: &Map<String, Value>, prefix: Option<&str>) {
        for (key, value) in object {
            let path = match prefix {
                Some(prefix) => format!("{}.{}", prefix, key),
                None => key.clone(),
            };
            let is_custom_root = prefix.is_none() && key == "custom";

            if !is_custom_root && !self.known.contains(path.as_str()) {
                self.record(&path, value);
            }
            if let Value::Object(child) = value {
                self.visit_object(child, Some(&path));
            }
        }
    }

    fn record(&mut self, path: &str, value: &Value) {
        if !self.stats.contains_key(path) {
            self.order.push(path.to_string());
        }
        let stats = self.stats.entry(path.to_string()).or_default();
        stats.occurrences += 1;
        stats.kinds.insert(ValueKind::of(value));
    }
}

/// Infers fields that only appear in real response payloads
#[derive(Debug, Clone)]
pub struct FieldDiscoverer {
    sample_size: usize,
}

impl Default for FieldDiscoverer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl FieldDiscoverer {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size: sample_size.max(1),
        }
    }

    /// Fields present in at least 10% of the sampled records and unknown to
    /// the standard and custom sources. Every sampled record must be a JSON object.
    pub fn discover(
        &self,
        sample_data: &[Value],
        standard_fields: &[DetectedField],
        custom_fields: &[DetectedField],
    ) -> DomainResult<Vec<DetectedField>> {
        let known: HashSet<&str> = standard_fields
            .iter()
            .chain(custom_fields.iter())
            .map(|f| f.key.as_str())
            .collect();

        let sample = &sample_data[..sample_data.len().min(self.sample_size)];
        if sample.is_empty() {
            return Ok(Vec::new());
        }

        let mut walk = DiscoveryWalk {
            known: &known,
            stats: HashMap::new(),
            order: Vec::new(),
        };
        for (index, record) in sample.iter().enumerate() {
            match record {
                Value::Object(map) => walk.visit_record(map),
                other => {
                    return Err(ValidationError::malformed_sample(
                        index,
                        &format!("expected an object, found {}", json_kind_name(other)),
                    )
                    .into())
                }
            }
        }

        let threshold = (sample.len() / 10).max(1);
        let DiscoveryWalk { stats, order, .. } = walk;
        let discovered: Vec<DetectedField> = order
            .into_iter()
            .filter_map(|key| {
                let key_stats = stats.get(&key)?;
                (key_stats.occurrences >= threshold)
                    .then(|| DetectedField::discovered(key.clone(), key_stats.resolve_type()))
            })
            .collect();

        debug!(
            "Discovered {} new fields from {} sample records (threshold {})",
            discovered.len(),
            sample.len(),
            threshold
        );
        Ok(discovered)
    }
}

fn json_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
