// ============================================================
// REPORT NORMALIZER USE CASE
// ============================================================
// Map a classified dataset onto the canonical columns of its report type

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::chemical::{categorize_chemical, determine_po_type, extract_chemical_name, standard_po_type};
use crate::domain::dataset::{CellValue, Dataset};
use crate::domain::error::{AppError, Result};
use crate::domain::money::parse_currency;
use crate::domain::report::ReportType;

/// How a derived column is computed from existing ones
#[derive(Debug, Clone)]
pub enum Derivation {
    /// Chemical name pulled from a free-text description column
    ChemicalName { source: &'static str },
    /// Treatment category of a chemical name column
    ChemicalCategory { source: &'static str },
    /// Product of numeric columns; a factor with a default may be missing
    Product {
        factors: &'static [(&'static str, Option<f64>)],
    },
    /// `Catalog` / `Free Text` guessed from a description column
    PoType { source: &'static str },
    /// Order type column in its standard spelling; blanks become `Free Text`
    PurchaseOrderType { source: &'static str },
    /// Copy of the first present source column, else a constant
    FirstOf {
        sources: &'static [&'static str],
        default: &'static str,
    },
    Constant(&'static str),
}

#[derive(Debug, Clone)]
pub struct DerivedColumn {
    pub name: &'static str,
    pub derivation: Derivation,
}

/// Canonical layout of one report type
#[derive(Debug, Clone)]
pub struct ReportSchema {
    pub report_type: ReportType,
    /// Source name to canonical name, applied in order
    pub renames: &'static [(&'static str, &'static str)],
    pub drop: &'static [&'static str],
    pub drop_blank_columns: bool,
    /// Canonical name to lowercase name fragments. Used when neither the canonical
    /// name nor a rename source is present: the first non-blank, non-canonical
    /// column containing a fragment takes the canonical name.
    pub fallbacks: &'static [(&'static str, &'static [&'static str])],
    /// Canonical columns that must be present once renames and fallbacks are applied
    pub expected: &'static [&'static str],
    /// Currency / quantity columns coerced to numbers
    pub numeric: &'static [&'static str],
    /// Added only when the column is absent
    pub derived: &'static [DerivedColumn],
    /// Text written into blank cells of these columns, last
    pub defaults: &'static [(&'static str, &'static str)],
}

const CHEMICAL_SPEND: ReportSchema = ReportSchema {
    report_type: ReportType::ChemicalSpendBySupplier,
    renames: &[
        ("Vendor ID", "Vendor_ID"),
        ("Vendor Name", "Supplier"),
        ("Supplier Category", "Supplier_Category"),
        ("Line of Service", "Line_of_Service"),
        ("Department ID", "Department_ID"),
        ("Bill #", "Order_ID"),
        ("Bill Date", "Date"),
        ("Rate", "Unit_Price"),
        ("Amount", "Total_Cost"),
        ("Purchase Order Type", "PO_Type"),
    ],
    drop: &["Date Created"],
    drop_blank_columns: true,
    fallbacks: &[
        ("Supplier", &["vendor", "supplier"]),
        ("Description", &["description", "item"]),
        ("Date", &["date"]),
        ("Total_Cost", &["amount", "cost"]),
        ("Order_ID", &["bill", "invoice", "order"]),
        ("PO_Type", &["type"]),
    ],
    expected: &["Supplier", "Total_Cost"],
    numeric: &["Quantity", "Unit_Price", "Total_Cost"],
    derived: &[
        DerivedColumn {
            name: "Chemical",
            derivation: Derivation::ChemicalName {
                source: "Description",
            },
        },
        DerivedColumn {
            name: "Chemical_Category",
            derivation: Derivation::ChemicalCategory { source: "Chemical" },
        },
        DerivedColumn {
            name: "PO_Type",
            derivation: Derivation::PoType {
                source: "Description",
            },
        },
        DerivedColumn {
            name: "Type: Purchase Order",
            derivation: Derivation::PurchaseOrderType { source: "PO_Type" },
        },
        DerivedColumn {
            name: "Region",
            derivation: Derivation::Constant("Unknown"),
        },
        DerivedColumn {
            name: "Facility",
            derivation: Derivation::FirstOf {
                sources: &["Department", "Department Name"],
                default: "Unknown Facility",
            },
        },
    ],
    defaults: &[
        ("Supplier", "Unknown Supplier"),
        ("Description", "Unknown Item"),
        ("Order_ID", "Unknown"),
        ("Chemical", "Unknown Chemical"),
        ("Chemical_Category", "Other"),
        ("Region", "Unknown"),
        ("Department", "Unknown"),
        ("PO_Type", "Unknown"),
        ("Facility", "Unknown Facility"),
        ("Type: Purchase Order", "Free Text"),
        ("Units", "Non-PO"),
    ],
};

const NON_PO_INVOICE: ReportSchema = ReportSchema {
    report_type: ReportType::NonPoInvoice,
    renames: &[
        ("Invoice: Number", "Order_ID"),
        ("Supplier: Name", "Supplier"),
        ("Net Amount", "Total_Cost"),
        ("Invoice: Created Date", "Date"),
        ("Dimension3 Description", "Chemical"),
        ("Dimension4 Description", "Region"),
        ("Dimension5 Description", "Facility"),
    ],
    drop: &["Date Created"],
    drop_blank_columns: false,
    fallbacks: &[],
    expected: &["Order_ID", "Supplier", "Total_Cost"],
    numeric: &["Total_Cost"],
    derived: &[DerivedColumn {
        name: "Chemical_Category",
        derivation: Derivation::ChemicalCategory { source: "Chemical" },
    }],
    defaults: &[],
};

const PO_LINE_DETAIL: ReportSchema = ReportSchema {
    report_type: ReportType::PoLineDetail,
    renames: &[
        ("Order Identifier", "Order_ID"),
        ("Purchase Order: Supplier", "Supplier"),
        ("Item Description", "Description"),
        ("Confirmed Unit Price", "Unit_Price"),
        ("Confirmed Quantity", "Quantity"),
        ("Purchase Order: Confirmation Date", "Date"),
        ("Type", "PO_Type"),
    ],
    drop: &["Date Created"],
    drop_blank_columns: false,
    fallbacks: &[],
    expected: &["Order_ID", "Supplier", "Description", "Unit_Price"],
    numeric: &["Unit_Price", "Quantity", "Total_Cost"],
    derived: &[DerivedColumn {
        name: "Total_Cost",
        derivation: Derivation::Product {
            factors: &[("Unit_Price", None), ("Quantity", Some(1.0))],
        },
    }],
    defaults: &[],
};

impl ReportSchema {
    fn canonical_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        let all = self
            .renames
            .iter()
            .map(|(_, to)| *to)
            .chain(self.fallbacks.iter().map(|(to, _)| *to))
            .chain(self.expected.iter().copied())
            .chain(self.numeric.iter().copied())
            .chain(self.derived.iter().map(|d| d.name))
            .chain(self.defaults.iter().map(|(name, _)| *name));
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Names a fallback must never claim: canonical names and rename sources.
    fn is_reserved(&self, column: &str) -> bool {
        let column = column.trim();
        self.canonical_names()
            .into_iter()
            .chain(self.renames.iter().map(|(from, _)| *from))
            .any(|name| name.eq_ignore_ascii_case(column))
    }

    /// Expected columns and their rename sources survive the blank-column pass.
    fn is_protected(&self, column: &str) -> bool {
        let column = column.trim();
        self.expected.iter().any(|canonical| {
            canonical.eq_ignore_ascii_case(column)
                || self
                    .renames
                    .iter()
                    .any(|(from, to)| to == canonical && from.eq_ignore_ascii_case(column))
        })
    }

    /// Expected columns absent from a dataset whose columns are already resolved.
    pub fn missing_columns(&self, dataset: &Dataset) -> Vec<String> {
        self.expected
            .iter()
            .filter(|canonical| !dataset.has_column(canonical))
            .map(|c| c.to_string())
            .collect()
    }
}

/// What one normalization pass changed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub report_type: Option<ReportType>,
    pub renamed: Vec<(String, String)>,
    /// Renames not applied because the canonical column already existed
    pub skipped_renames: Vec<(String, String)>,
    pub dropped: Vec<String>,
    pub derived: Vec<String>,
    pub coerced_cells: usize,
    /// Blank cells given their column's default text
    pub filled_cells: usize,
    pub row_count: usize,
}

impl NormalizationReport {
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty()
            && self.dropped.is_empty()
            && self.derived.is_empty()
            && self.coerced_cells == 0
            && self.filled_cells == 0
    }
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub dataset: Dataset,
    pub report: NormalizationReport,
}

pub struct ReportNormalizer {
    schemas: HashMap<ReportType, ReportSchema>,
}

impl Default for ReportNormalizer {
    fn default() -> Self {
        let mut schemas = HashMap::new();
        for schema in [CHEMICAL_SPEND, NON_PO_INVOICE, PO_LINE_DETAIL] {
            schemas.insert(schema.report_type, schema);
        }
        Self { schemas }
    }
}

impl ReportNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self, report_type: ReportType) -> Option<&ReportSchema> {
        self.schemas.get(&report_type)
    }

    /// Normalize `dataset` to the canonical schema of `report_type`.
    ///
    /// Row count never changes. Running it again on its own output changes
    /// nothing. `Unknown` (or any type without a schema) passes through.
    pub fn normalize(&self, dataset: Dataset, report_type: ReportType) -> Result<Normalized> {
        let row_count = dataset.row_count();
        let Some(schema) = self.schemas.get(&report_type) else {
            return Ok(Normalized {
                dataset,
                report: NormalizationReport {
                    row_count,
                    ..NormalizationReport::default()
                },
            });
        };

        let mut report = NormalizationReport {
            report_type: Some(report_type),
            row_count,
            ..NormalizationReport::default()
        };

        let mut dataset = drop_listed(dataset, schema, &mut report);
        if schema.drop_blank_columns {
            dataset = drop_blank(dataset, schema, &mut report);
        }
        dataset = rename_columns(dataset, schema, &mut report)?;
        dataset = apply_fallbacks(dataset, schema, &mut report)?;

        let missing = schema.missing_columns(&dataset);
        if !missing.is_empty() {
            return Err(AppError::ValidationError(format!(
                "{} report is missing required columns: {}",
                report_type.label(),
                missing.join(", ")
            )));
        }

        dataset = coerce_numeric(dataset, schema, &mut report);
        dataset = derive_columns(dataset, schema, &mut report)?;
        dataset = fill_defaults(dataset, schema, &mut report);

        info!(
            report_type = report_type.slug(),
            rows = row_count,
            renamed = report.renamed.len(),
            dropped = report.dropped.len(),
            derived = report.derived.len(),
            coerced = report.coerced_cells,
            filled = report.filled_cells,
            "Dataset normalized"
        );

        Ok(Normalized { dataset, report })
    }
}

fn drop_listed(mut dataset: Dataset, schema: &ReportSchema, report: &mut NormalizationReport) -> Dataset {
    for name in schema.drop {
        if let Some(actual) = dataset.find_column(name).map(str::to_string) {
            dataset = dataset.drop_column(&actual);
            report.dropped.push(actual);
        }
    }
    dataset
}

fn drop_blank(mut dataset: Dataset, schema: &ReportSchema, report: &mut NormalizationReport) -> Dataset {
    for name in dataset.blank_columns() {
        if schema.is_protected(&name) {
            continue;
        }
        dataset = dataset.drop_column(&name);
        report.dropped.push(name);
    }
    dataset
}

fn rename_columns(
    mut dataset: Dataset,
    schema: &ReportSchema,
    report: &mut NormalizationReport,
) -> Result<Dataset> {
    // Case or padding variants of canonical names become exact first
    for canonical in schema.canonical_names() {
        if dataset.has_column(canonical) {
            continue;
        }
        if let Some(actual) = dataset.find_column(canonical).map(str::to_string) {
            dataset = dataset.rename_column(&actual, canonical)?;
            report.renamed.push((actual, canonical.to_string()));
        }
    }

    for (from, to) in schema.renames {
        if from == to {
            continue;
        }
        let Some(actual) = dataset.find_column(from).map(str::to_string) else {
            continue;
        };
        if actual == *to {
            continue;
        }
        if dataset.has_column(to) {
            warn!(
                from = %actual,
                to = *to,
                "Canonical column already present, keeping source column as is"
            );
            report.skipped_renames.push((actual, to.to_string()));
            continue;
        }
        dataset = dataset.rename_column(&actual, to)?;
        report.renamed.push((actual, to.to_string()));
    }

    Ok(dataset)
}

fn apply_fallbacks(
    mut dataset: Dataset,
    schema: &ReportSchema,
    report: &mut NormalizationReport,
) -> Result<Dataset> {
    let blank = dataset.blank_columns();
    for (canonical, fragments) in schema.fallbacks {
        if dataset.has_column(canonical) {
            continue;
        }
        let candidate = dataset
            .columns()
            .iter()
            .find(|column| {
                let lower = column.to_lowercase();
                !blank.contains(column)
                    && !schema.is_reserved(column)
                    && fragments.iter().any(|f| lower.contains(f))
            })
            .cloned();
        let Some(actual) = candidate else {
            continue;
        };
        debug!(from = %actual, to = *canonical, "Column matched by name fragment");
        dataset = dataset.rename_column(&actual, canonical)?;
        report.renamed.push((actual, canonical.to_string()));
    }
    Ok(dataset)
}

fn coerce_numeric(mut dataset: Dataset, schema: &ReportSchema, report: &mut NormalizationReport) -> Dataset {
    for column in schema.numeric {
        let Some(values) = dataset.column_values(column) else {
            continue;
        };
        let changed = values.filter(|v| v.as_f64().is_none()).count();
        if changed == 0 {
            continue;
        }

        dataset = dataset.map_column(column, to_number);
        report.coerced_cells += changed;
    }
    dataset
}

/// Currency text to a number. Blank and unparseable values become zero.
fn to_number(value: &CellValue) -> CellValue {
    match value {
        CellValue::Number(n) => CellValue::Number(*n),
        CellValue::Text(s) => CellValue::Number(parse_currency(s).unwrap_or(0.0)),
        CellValue::Null => CellValue::Number(0.0),
    }
}

fn is_blank(value: &CellValue) -> bool {
    match value {
        CellValue::Null => true,
        CellValue::Text(s) => s.trim().is_empty(),
        CellValue::Number(_) => false,
    }
}

fn fill_defaults(mut dataset: Dataset, schema: &ReportSchema, report: &mut NormalizationReport) -> Dataset {
    for (column, default) in schema.defaults {
        let Some(values) = dataset.column_values(column) else {
            continue;
        };
        let blanks = values.filter(|v| is_blank(v)).count();
        if blanks == 0 {
            continue;
        }
        dataset = dataset.map_column(column, |v| {
            if is_blank(v) {
                CellValue::text(*default)
            } else {
                v.clone()
            }
        });
        report.filled_cells += blanks;
    }
    dataset
}

fn derive_columns(
    mut dataset: Dataset,
    schema: &ReportSchema,
    report: &mut NormalizationReport,
) -> Result<Dataset> {
    for derived in schema.derived {
        if dataset.has_column(derived.name) {
            continue;
        }
        let Some(values) = derive_values(&dataset, &derived.derivation) else {
            continue;
        };
        dataset = dataset.with_column(derived.name, values)?;
        report.derived.push(derived.name.to_string());
    }
    Ok(dataset)
}

fn derive_values(dataset: &Dataset, derivation: &Derivation) -> Option<Vec<CellValue>> {
    match derivation {
        Derivation::ChemicalName { source } => Some(
            dataset
                .column_values(source)?
                .map(|v| match v {
                    CellValue::Null => CellValue::Null,
                    other => CellValue::text(extract_chemical_name(&other.to_string())),
                })
                .collect(),
        ),
        Derivation::ChemicalCategory { source } => Some(
            dataset
                .column_values(source)?
                .map(|v| match v {
                    CellValue::Null => CellValue::Null,
                    other => CellValue::text(categorize_chemical(&other.to_string())),
                })
                .collect(),
        ),
        Derivation::Product { factors } => {
            let mut product = vec![1.0f64; dataset.row_count()];
            for (column, default) in factors.iter() {
                match (dataset.column_values(column), default) {
                    (Some(values), _) => {
                        for (acc, value) in product.iter_mut().zip(values) {
                            *acc *= value.as_f64().unwrap_or(0.0);
                        }
                    }
                    (None, Some(d)) => product.iter_mut().for_each(|acc| *acc *= d),
                    (None, None) => return None,
                }
            }
            Some(product.into_iter().map(CellValue::from).collect())
        }
        Derivation::PoType { source } => Some(
            dataset
                .column_values(source)?
                .map(|v| CellValue::text(determine_po_type(&v.to_string())))
                .collect(),
        ),
        Derivation::PurchaseOrderType { source } => Some(
            dataset
                .column_values(source)?
                .map(|v| CellValue::text(standard_po_type(&v.to_string())))
                .collect(),
        ),
        Derivation::FirstOf { sources, default } => match sources.iter().find_map(|s| dataset.column_values(s)) {
            Some(values) => Some(values.cloned().collect()),
            None => Some(vec![CellValue::text(*default); dataset.row_count()]),
        },
        Derivation::Constant(value) => Some(vec![CellValue::text(*value); dataset.row_count()]),
    }
}
