use crate::domains::export::types::{ExportError, ExportFormat};
use crate::domains::fields::types::FieldMapping;
use csv::{QuoteStyle, Writer, WriterBuilder};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Leading line of the spreadsheet fallback output
pub const XLSX_FALLBACK_NOTICE: &str =
    "// XLSX encoding is not available; records are exported as JSON instead";

/// One output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    pub key: String,
    pub label: String,
}

/// Included mappings as columns, sorted by `order`.
pub fn columns_from_mappings(mappings: &[FieldMapping]) -> Vec<ExportColumn> {
    let mut included: Vec<&FieldMapping> = mappings.iter().filter(|m| m.include).collect();
    included.sort_by_key(|m| m.order);
    included
        .into_iter()
        .map(|m| ExportColumn {
            key: m.key.clone(),
            label: m.label.clone(),
        })
        .collect()
}

/// Top-level record keys in first-seen order.
pub fn columns_from_records(records: &[Value]) -> Vec<ExportColumn> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if seen.insert(key.clone()) {
                    columns.push(ExportColumn {
                        key: key.clone(),
                        label: key.clone(),
                    });
                }
            }
        }
    }
    columns
}

/// Resolve `path` against a record. An exact top-level key wins over a
/// dotted walk, so `custom.Region` stored flat is still found.
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    if !path.contains('.') {
        return None;
    }
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

/// Render a JSON value as a single CSV cell
pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => {
            if items.iter().all(is_scalar) {
                items
                    .iter()
                    .map(|item| format_cell(Some(item)))
                    .collect::<Vec<_>>()
                    .join("; ")
            } else {
                Value::Array(items.clone()).to_string()
            }
        }
        Some(object @ Value::Object(_)) => object.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Incremental formatter fed one batch of records at a time.
///
/// Without explicit columns, the first non-empty batch fixes the column set;
/// keys first appearing in later batches are not exported.
pub struct ExportWriter {
    format: ExportFormat,
    columns: Option<Vec<ExportColumn>>,
    csv: Option<Writer<Vec<u8>>>,
    rows: Vec<Value>,
    rows_written: usize,
}

impl ExportWriter {
    pub fn new(format: ExportFormat, mappings: &[FieldMapping]) -> Self {
        let columns = if mappings.is_empty() {
            None
        } else {
            Some(columns_from_mappings(mappings))
        };
        Self {
            format,
            columns,
            csv: None,
            rows: Vec::new(),
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn write_batch(&mut self, records: &[Value]) -> Result<(), ExportError> {
        if records.is_empty() {
            return Ok(());
        }
        match self.format {
            ExportFormat::Csv => self.write_csv(records)?,
            ExportFormat::Json | ExportFormat::Xlsx => self.collect_json(records),
        }
        self.rows_written += records.len();
        Ok(())
    }

    fn write_csv(&mut self, records: &[Value]) -> Result<(), ExportError> {
        let columns = self
            .columns
            .get_or_insert_with(|| columns_from_records(records))
            .clone();

        if self.csv.is_none() {
            let mut writer = WriterBuilder::new()
                .quote_style(QuoteStyle::Necessary)
                .from_writer(Vec::new());
            writer.write_record(columns.iter().map(|c| c.key.as_str()))?;
            self.csv = Some(writer);
        }

        if let Some(writer) = self.csv.as_mut() {
            for record in records {
                let row: Vec<String> = columns
                    .iter()
                    .map(|c| format_cell(resolve_path(record, &c.key)))
                    .collect();
                writer.write_record(&row)?;
            }
        }
        Ok(())
    }

    fn collect_json(&mut self, records: &[Value]) {
        match &self.columns {
            Some(columns) => {
                for record in records {
                    let mut row = Map::new();
                    for column in columns {
                        let value = resolve_path(record, &column.key)
                            .cloned()
                            .unwrap_or(Value::Null);
                        row.insert(column.key.clone(), value);
                    }
                    self.rows.push(Value::Object(row));
                }
            }
            None => self.rows.extend(records.iter().cloned()),
        }
    }

    /// Finish the output and return it as text
    pub fn finish(self) -> Result<String, ExportError> {
        match self.format {
            ExportFormat::Csv => {
                let bytes = match self.csv {
                    Some(writer) => writer
                        .into_inner()
                        .map_err(|e| ExportError::Serialization(e.to_string()))?,
                    None => {
                        // Header-only output when no rows were written
                        let mut writer = WriterBuilder::new()
                            .quote_style(QuoteStyle::Necessary)
                            .from_writer(Vec::new());
                        if let Some(columns) = &self.columns {
                            writer.write_record(columns.iter().map(|c| c.key.as_str()))?;
                        }
                        writer
                            .into_inner()
                            .map_err(|e| ExportError::Serialization(e.to_string()))?
                    }
                };
                String::from_utf8(bytes).map_err(|e| ExportError::Serialization(e.to_string()))
            }
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&Value::Array(self.rows))?),
            ExportFormat::Xlsx => {
                let body = serde_json::to_string_pretty(&Value::Array(self.rows))?;
                Ok(format!("{}\n{}", XLSX_FALLBACK_NOTICE, body))
            }
        }
    }
}

/// Format a complete record set in one call
pub fn format_records(
    format: ExportFormat,
    mappings: &[FieldMapping],
    records: &[Value],
) -> Result<String, ExportError> {
    let mut writer = ExportWriter::new(format, mappings);
    writer.write_batch(records)?;
    writer.finish()
}
