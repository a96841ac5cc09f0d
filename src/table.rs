use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Column {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(default, rename = "dataType")]
    pub data_type: String,
}

/// Column-major summary data as handed over by the host: column descriptors
/// plus one array of cells per row.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SummaryTable {
    pub columns: Vec<Column>,
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

/// Column names grouped by the host's data type.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColumnSets {
    pub all: Vec<String>,
    pub strings: Vec<String>,
    pub numbers: Vec<String>,
}

impl ColumnSets {
    /// Columns of plain row objects, in first-seen order. A column is typed by
    /// its first non-null value.
    pub fn infer(records: &[Record]) -> Self {
        let mut sets = Self::default();
        let mut typed = Vec::new();

        for record in records {
            for (name, value) in record {
                if !sets.all.contains(name) {
                    sets.all.push(name.clone());
                }
                if value.is_null() || typed.contains(name) {
                    continue;
                }
                typed.push(name.clone());
                match value {
                    Value::String(_) => sets.strings.push(name.clone()),
                    Value::Number(_) => sets.numbers.push(name.clone()),
                    _ => {}
                }
            }
        }
        sets
    }
}

/// A decoded input file: its rows plus the columns offered for mapping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub columns: ColumnSets,
}

impl SummaryTable {
    pub fn columns(&self) -> ColumnSets {
        let mut sets = ColumnSets::default();
        for column in &self.columns {
            sets.all.push(column.field_name.clone());
            match column.data_type.as_str() {
                "string" => sets.strings.push(column.field_name.clone()),
                "int" | "float" => sets.numbers.push(column.field_name.clone()),
                _ => {}
            }
        }
        sets
    }

    /// One record per row keyed by column name. Short rows leave their
    /// trailing attributes absent.
    pub fn to_records(&self) -> Vec<Record> {
        self.data
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| (column.field_name.clone(), cell_value(cell)))
                    .collect()
            })
            .collect()
    }
}

// Cells are either bare values or `{ "value": .., "formattedValue": .. }`.
fn cell_value(cell: &Value) -> Value {
    match cell {
        Value::Object(object) => object.get("value").cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Reads a dataset that is either an array of row objects or a summary
/// table.
pub fn load_dataset(raw: &str) -> Result<Dataset> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON dataset")?;

    match parsed {
        Value::Array(rows) => {
            let records = rows
                .into_iter()
                .enumerate()
                .map(|(index, row)| match row {
                    Value::Object(record) => Ok(record),
                    other => Err(anyhow!("row {index} is not an object: {other}")),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Dataset {
                columns: ColumnSets::infer(&records),
                records,
            })
        }
        Value::Object(_) => {
            let table = SummaryTable::deserialize(&parsed)
                .context("dataset object is not a summary table")?;
            Ok(Dataset {
                records: table.to_records(),
                columns: table.columns(),
            })
        }
        _ => Err(anyhow!("unexpected JSON type for dataset")),
    }
}
