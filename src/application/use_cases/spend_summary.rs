use std::collections::HashMap;

use serde::Serialize;

use crate::domain::dataset::{CellValue, Dataset};
use crate::domain::error::{AppError, Result};
use crate::domain::money::parse_currency;

pub const COST_COLUMN: &str = "Total_Cost";
pub const SUPPLIER_COLUMN: &str = "Supplier";
pub const CATEGORY_COLUMN: &str = "Chemical_Category";
const BLANK_GROUP: &str = "(blank)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendGroup {
    pub name: String,
    pub total: f64,
    pub rows: usize,
}

/// Totals over a normalized dataset's `Total_Cost` column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendSummary {
    pub rows: usize,
    pub total_spend: f64,
    pub credit_count: usize,
    pub credit_total: f64,
    pub top_suppliers: Vec<SpendGroup>,
    /// Empty when the dataset has no category column
    pub by_category: Vec<SpendGroup>,
}

impl SpendSummary {
    /// Spend before credits are netted out.
    pub fn gross_spend(&self) -> f64 {
        self.total_spend - self.credit_total
    }
}

fn cost_of(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_currency(s),
        CellValue::Null => None,
    }
}

fn group_key(value: Option<&CellValue>) -> String {
    match value {
        Some(v) if !v.is_null() => v.to_string(),
        _ => BLANK_GROUP.to_string(),
    }
}

fn group_spend(dataset: &Dataset, column: &str, limit: Option<usize>) -> Vec<SpendGroup> {
    let mut groups: HashMap<String, SpendGroup> = HashMap::new();
    for row in dataset.rows() {
        let Some(cost) = row.get(COST_COLUMN).and_then(cost_of) else {
            continue;
        };
        let name = group_key(row.get(column));
        let entry = groups.entry(name.clone()).or_insert(SpendGroup {
            name,
            total: 0.0,
            rows: 0,
        });
        entry.total += cost;
        entry.rows += 1;
    }

    let mut groups: Vec<SpendGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    if let Some(limit) = limit {
        groups.truncate(limit);
    }
    groups
}

/// Summarize spend; the dataset must carry a `Total_Cost` column.
pub fn summarize(dataset: &Dataset, top_suppliers: usize) -> Result<SpendSummary> {
    let values = dataset.column_values(COST_COLUMN).ok_or_else(|| {
        AppError::ValidationError(format!("Dataset has no {} column to summarize", COST_COLUMN))
    })?;

    let mut total_spend = 0.0;
    let mut credit_count = 0;
    let mut credit_total = 0.0;
    for cost in values.filter_map(cost_of) {
        total_spend += cost;
        if cost < 0.0 {
            credit_count += 1;
            credit_total += cost;
        }
    }

    let top_suppliers = if dataset.has_column(SUPPLIER_COLUMN) {
        group_spend(dataset, SUPPLIER_COLUMN, Some(top_suppliers))
    } else {
        Vec::new()
    };
    let by_category = if dataset.has_column(CATEGORY_COLUMN) {
        group_spend(dataset, CATEGORY_COLUMN, None)
    } else {
        Vec::new()
    };

    Ok(SpendSummary {
        rows: dataset.row_count(),
        total_spend,
        credit_count,
        credit_total,
        top_suppliers,
        by_category,
    })
}
