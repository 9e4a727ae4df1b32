// ============================================================
// COMMAND LINE INTERFACE
// ============================================================
// Argument parsing and command execution for `report-ingest`

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::AppContext;
use crate::application::use_cases::report_ingestion::IngestRequest;
use crate::application::use_cases::spend_summary::summarize;
use crate::domain::dataset::{distinct_values, Dataset};
use crate::domain::error::{AppError, Result};
use crate::domain::money::format_currency;
use crate::domain::record::DatasetRecord;
use crate::domain::report::ReportType;
use crate::infrastructure::spreadsheet::SheetSelector;

const DEFAULT_SHOW_ROWS: usize = 10;
const DEFAULT_TOP_SUPPLIERS: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "report-ingest",
    version,
    about = "Classify, normalize and store procurement report exports",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Ingest a CSV or Excel export into the dataset store
    Import {
        path: PathBuf,
        /// Skip classification and treat the file as this report type
        #[arg(long = "type", value_name = "TYPE")]
        forced_type: Option<ReportType>,
        /// Worksheet index (0-based) or name; defaults to the first sheet
        #[arg(long, value_parser = parse_sheet)]
        sheet: Option<SheetSelector>,
        /// Display name; defaults to "<file stem> (<date>) - <report type>"
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List stored datasets, oldest first
    List,
    /// Print a stored dataset's metadata and its first rows as CSV
    Show {
        id: String,
        #[arg(long, default_value_t = DEFAULT_SHOW_ROWS)]
        rows: usize,
    },
    /// Spend totals, credits, top suppliers and categories of a stored dataset
    Summary {
        id: String,
        #[arg(long, default_value_t = DEFAULT_TOP_SUPPLIERS)]
        top: usize,
    },
    Delete {
        id: String,
    },
    /// Delete every stored dataset
    Clear,
    /// Print the report type a file would be classified as
    Classify {
        path: PathBuf,
        #[arg(long, value_parser = parse_sheet)]
        sheet: Option<SheetSelector>,
    },
    /// Print a column profile of a file as JSON
    Inspect {
        path: PathBuf,
        #[arg(long, value_parser = parse_sheet)]
        sheet: Option<SheetSelector>,
    },
    /// Count the distinct values of one column of a file
    Values {
        path: PathBuf,
        column: String,
        #[arg(long, value_parser = parse_sheet)]
        sheet: Option<SheetSelector>,
    },
    /// Remove leftovers of interrupted writes and deletes
    Reconcile,
}

impl Command {
    /// Commands that read input files only and never touch the store
    pub fn needs_store(&self) -> bool {
        !matches!(
            self,
            Command::Classify { .. } | Command::Inspect { .. } | Command::Values { .. }
        )
    }
}

fn parse_sheet(raw: &str) -> std::result::Result<SheetSelector, String> {
    if raw.trim().is_empty() {
        return Err("sheet must be an index or a name".to_string());
    }
    Ok(SheetSelector::parse(raw))
}

/// Run one command; the returned text goes to stdout.
pub async fn execute(ctx: &AppContext, command: Command) -> Result<String> {
    match command {
        Command::Import {
            path,
            forced_type,
            sheet,
            name,
            description,
        } => {
            let request = IngestRequest {
                display_name: name,
                description,
                forced_type,
                sheet,
            };
            let outcome = ctx.ingestion()?.ingest(&path, request).await?;
            let mut out = String::new();
            let _ = writeln!(out, "Imported {}", outcome.record.id);
            let _ = writeln!(out, "  name:    {}", outcome.record.name);
            let _ = writeln!(out, "  type:    {}", outcome.record.report_type);
            let _ = writeln!(
                out,
                "  shape:   {} rows x {} columns",
                outcome.record.record_count, outcome.record.column_count
            );
            if !outcome.report.dropped.is_empty() {
                let _ = writeln!(out, "  dropped: {}", outcome.report.dropped.join(", "));
            }
            for (from, to) in &outcome.report.renamed {
                let _ = writeln!(out, "  renamed: {} -> {}", from, to);
            }
            for id in &outcome.replaced {
                let _ = writeln!(out, "  replaced {}", id);
            }
            Ok(out)
        }
        Command::List => {
            let records = ctx.ingestion()?.store().list().await?;
            if records.is_empty() {
                return Ok("No stored datasets".to_string());
            }
            let mut out = String::new();
            for record in &records {
                let _ = writeln!(out, "{}", record_line(record));
            }
            Ok(out)
        }
        Command::Show { id, rows } => {
            let (dataset, record) = load(ctx, &id).await?;
            let mut out = String::new();
            let _ = writeln!(out, "{}", record_line(&record));
            if let Some(description) = &record.description {
                let _ = writeln!(out, "{}", description);
            }
            out.push_str(&render_csv(&dataset.head(rows))?);
            Ok(out)
        }
        Command::Summary { id, top } => {
            let (dataset, record) = load(ctx, &id).await?;
            let summary = summarize(&dataset, top)?;
            let mut out = String::new();
            let _ = writeln!(out, "{}", record_line(&record));
            let _ = writeln!(out, "Rows:        {}", summary.rows);
            let _ = writeln!(out, "Total spend: {}", format_currency(summary.total_spend));
            let _ = writeln!(out, "Gross spend: {}", format_currency(summary.gross_spend()));
            let _ = writeln!(
                out,
                "Credits:     {} ({})",
                summary.credit_count,
                format_currency(summary.credit_total)
            );
            if !summary.top_suppliers.is_empty() {
                let _ = writeln!(out, "Top suppliers:");
                for group in &summary.top_suppliers {
                    let _ = writeln!(out, "  {:<40} {:>16}", group.name, format_currency(group.total));
                }
            }
            if !summary.by_category.is_empty() {
                let _ = writeln!(out, "By category:");
                for group in &summary.by_category {
                    let _ = writeln!(out, "  {:<40} {:>16}", group.name, format_currency(group.total));
                }
            }
            Ok(out)
        }
        Command::Delete { id } => {
            if ctx.ingestion()?.store().delete(&id).await? {
                Ok(format!("Deleted {}", id))
            } else {
                Err(AppError::NotFound(format!("No dataset with id {}", id)))
            }
        }
        Command::Clear => {
            let removed = ctx.ingestion()?.store().clear().await?;
            Ok(format!("Removed {} dataset(s)", removed))
        }
        Command::Classify { path, sheet } => {
            let loaded = ctx.loader().load(&path, sheet.as_ref())?;
            let classification = ctx.classifier().classify(&loaded.dataset, &loaded.file_name);
            let mut out = format!("{}", classification.report_type);
            if let Some(signature) = &classification.signature {
                let _ = write!(out, " (signature {}, matched by {:?})", signature, classification.matched_by);
            }
            Ok(out)
        }
        Command::Inspect { path, sheet } => {
            let profile = ctx.loader().inspect(&path, sheet.as_ref())?;
            serde_json::to_string_pretty(&profile)
                .map_err(|e| AppError::Internal(format!("Failed to render profile: {}", e)))
        }
        Command::Values { path, column, sheet } => {
            let loaded = ctx.loader().load(&path, sheet.as_ref())?;
            let actual = loaded
                .dataset
                .find_column(&column)
                .ok_or_else(|| AppError::NotFound(format!("Column '{}' not found", column)))?;
            let values = distinct_values(&loaded.dataset, actual).unwrap_or_default();
            let mut out = String::new();
            for value in values {
                let shown = if value.value.is_empty() { "(blank)" } else { value.value.as_str() };
                let _ = writeln!(out, "{:>8}  {}", value.count, shown);
            }
            Ok(out)
        }
        Command::Reconcile => {
            let report = ctx.ingestion()?.store().reconcile().await?;
            Ok(format!(
                "Removed {} temp file(s), {} tombstone(s), {} orphan document(s), {} orphan record(s)",
                report.temp_files_removed,
                report.tombstones_removed,
                report.orphan_documents_removed,
                report.orphan_records_removed
            ))
        }
    }
}

async fn load(ctx: &AppContext, id: &str) -> Result<(Dataset, DatasetRecord)> {
    ctx.ingestion()?
        .store()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No dataset with id {}", id)))
}

fn record_line(record: &DatasetRecord) -> String {
    format!(
        "{}  {}  {:<28}  {:>6} rows  {}",
        record.id,
        record.uploaded_at.format("%Y-%m-%d %H:%M"),
        record.report_type.label(),
        record.record_count,
        record.name
    )
}

fn render_csv(dataset: &Dataset) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_err = |e: csv::Error| AppError::Internal(format!("Failed to render rows: {}", e));
    writer.write_record(dataset.columns()).map_err(to_err)?;
    for row in dataset.rows() {
        writer
            .write_record(row.values().iter().map(|v| v.to_string()))
            .map_err(to_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to render rows: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("Rows are not UTF-8: {}", e)))
}
