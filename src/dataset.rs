//! In-memory tabular dataset loaded from CSV.
//!
//! The dataset is read-only after load. Chart rendering and the
//! orchestrator only ever derive views from it (numeric projections,
//! value-count aggregations), never mutate it.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::info;

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Text,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    values: Vec<String>,
}

impl Column {
    /// Raw cell values in row order. Empty string means missing.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Parse the cell at `row` as a number, if possible.
    pub fn numeric(&self, row: usize) -> Option<f64> {
        self.values.get(row).and_then(|v| v.trim().parse::<f64>().ok())
    }
}

/// Basic data-quality statistics shown next to the upload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DataStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: usize,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn from_csv_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = dataset.row_count,
            columns = dataset.columns.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(AppError::Dataset("CSV file has no columns".to_string()));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut row_count = 0;
        for record in rdr.records() {
            let record = record?;
            for (idx, col) in cells.iter_mut().enumerate() {
                col.push(record.get(idx).unwrap_or("").to_string());
            }
            row_count += 1;
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| {
                let kind = infer_column_type(&values);
                Column { name, kind, values }
            })
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Canonical column names in dataset order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by its canonical name.
    pub fn column(&self, canonical: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == canonical)
    }

    pub fn resolver(&self) -> ColumnResolver {
        ColumnResolver::new(self.columns.iter().map(|c| c.name.clone()))
    }

    /// Frequency of each distinct value of `canonical`, sorted by descending
    /// count. Ties keep first-seen order.
    pub fn value_counts(&self, canonical: &str) -> Vec<(String, u64)> {
        let Some(column) = self.column(canonical) else {
            return Vec::new();
        };

        let mut counts: HashMap<&str, (usize, u64)> = HashMap::new();
        for (idx, value) in column.values().iter().enumerate() {
            let entry = counts.entry(value.as_str()).or_insert((idx, 0));
            entry.1 += 1;
        }

        let mut entries: Vec<(&str, usize, u64)> = counts
            .into_iter()
            .map(|(value, (first_seen, count))| (value, first_seen, count))
            .collect();
        entries.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
        entries
            .into_iter()
            .map(|(value, _, count)| (value.to_string(), count))
            .collect()
    }

    pub fn stats(&self) -> DataStats {
        let missing_values = self
            .columns
            .iter()
            .flat_map(|c| c.values())
            .filter(|v| v.trim().is_empty())
            .count();

        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut duplicate_rows = 0;
        for row in 0..self.row_count {
            let key = self
                .columns
                .iter()
                .map(|c| c.values()[row].as_str())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            if *count > 1 {
                duplicate_rows += 1;
            }
        }

        DataStats {
            total_rows: self.row_count,
            total_columns: self.columns.len(),
            missing_values,
            duplicate_rows,
        }
    }

    /// First `n` rows as plain text, used for prompt context.
    pub fn head_preview(&self, n: usize) -> String {
        let mut out = String::new();
        out.push_str(&self.column_names().join(", "));
        out.push('\n');
        for row in 0..self.row_count.min(n) {
            let line = self
                .columns
                .iter()
                .map(|c| c.values()[row].as_str())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Column name to inferred type, used for the overview prompt.
    pub fn dtypes(&self) -> Vec<(String, ColumnType)> {
        self.columns.iter().map(|c| (c.name.clone(), c.kind)).collect()
    }
}

fn infer_column_type(values: &[String]) -> ColumnType {
    let mut saw_number = false;
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.parse::<f64>().is_ok() {
            saw_number = true;
        } else {
            return ColumnType::Text;
        }
    }
    if saw_number {
        ColumnType::Numeric
    } else {
        ColumnType::Text
    }
}

/// Case-insensitive index over dataset column names. Resolution is exact
/// match after lowercasing, no fuzzy correction.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    by_lower: HashMap<String, String>,
    canonical: Vec<String>,
}

impl ColumnResolver {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let canonical: Vec<String> = names.into_iter().collect();
        let by_lower = canonical
            .iter()
            .map(|name| (name.to_lowercase(), name.clone()))
            .collect();
        Self { by_lower, canonical }
    }

    /// Resolve a requested name to the canonical column name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_lower.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Canonical names, in dataset order, for error messages.
    pub fn available(&self) -> &[String] {
        &self.canonical
    }
}
