// Dataset ingestion: read a CSV export or a named worksheet, intersect its
// headers with the known schema, and run the one-time cleaning pass.
use crate::error::DataLoadError;
use crate::store::Schema;
use crate::types::{Column, DisasterRecord, RawRow};
use crate::util::{non_blank, parse_f64_safe, parse_i64_safe};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub source: PathBuf,
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Rows missing one of the required fields, or rows the reader could not parse.
    pub dropped_rows: usize,
    /// Non-blank numeric cells that failed coercion and were stored as null.
    pub nulled_cells: usize,
    pub columns: Vec<Column>,
    pub loaded_at: DateTime<Utc>,
}

/// Cells of the source table, untyped.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    unreadable_rows: usize,
}

/// Load and clean a dataset. The reader is picked by file extension:
/// `.csv` is read as a flat table, spreadsheet formats are read from
/// `sheet_name`.
pub fn load_and_clean(
    path: &Path,
    sheet_name: &str,
) -> Result<(Vec<DisasterRecord>, Schema, LoadReport), DataLoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let table = match ext.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_sheet(path, sheet_name)?,
        _ => return Err(DataLoadError::UnsupportedFormat(path.to_path_buf())),
    };
    clean_table(path, table)
}

fn read_csv(path: &Path) -> Result<RawTable, DataLoadError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    let mut unreadable_rows = 0usize;
    for result in rdr.records() {
        match result {
            Ok(record) => rows.push(record.iter().map(|c| Some(c.to_string())).collect()),
            Err(e) => {
                debug!(error = %e, "skipping unreadable CSV row");
                unreadable_rows += 1;
            }
        }
    }
    Ok(RawTable { headers, rows, unreadable_rows })
}

fn read_sheet(path: &Path, sheet_name: &str) -> Result<RawTable, DataLoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names().to_vec();
    if !available.iter().any(|name| name == sheet_name) {
        return Err(DataLoadError::SheetNotFound {
            sheet: sheet_name.to_string(),
            available,
        });
    }
    let range = workbook.worksheet_range(sheet_name)?;
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| cell_text(c).unwrap_or_default().trim().to_string())
            .collect(),
        None => Vec::new(),
    };
    let rows = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    Ok(RawTable { headers, rows, unreadable_rows: 0 })
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) => Some(s.clone()),
        Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}

/// Map known columns to their position in the header row and check that
/// the required ones are there. Unknown headers are ignored; on duplicate
/// headers the first one wins.
fn resolve_headers(headers: &[String]) -> Result<HashMap<Column, usize>, DataLoadError> {
    let mut index = HashMap::new();
    for (pos, header) in headers.iter().enumerate() {
        if let Some(column) = Column::from_header(header) {
            index.entry(column).or_insert(pos);
        }
    }
    let missing: Vec<Column> = Column::REQUIRED
        .iter()
        .copied()
        .filter(|c| !index.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(DataLoadError::MissingColumns(missing));
    }
    Ok(index)
}

fn clean_table(
    path: &Path,
    table: RawTable,
) -> Result<(Vec<DisasterRecord>, Schema, LoadReport), DataLoadError> {
    let index = resolve_headers(&table.headers)?;
    let schema = Schema::new(index.keys().copied());

    let total_rows = table.rows.len() + table.unreadable_rows;
    let mut nulled_cells = 0usize;
    let mut records = Vec::with_capacity(table.rows.len());
    for cells in table.rows {
        let raw = RawRow::from_cells(|column| {
            index
                .get(&column)
                .and_then(|pos| cells.get(*pos))
                .cloned()
                .flatten()
        });
        if let Some(record) = clean_row(raw, &mut nulled_cells) {
            records.push(record);
        }
    }

    let kept_rows = records.len();
    let report = LoadReport {
        source: path.to_path_buf(),
        total_rows,
        kept_rows,
        dropped_rows: total_rows - kept_rows,
        nulled_cells,
        columns: schema.columns().collect(),
        loaded_at: Utc::now(),
    };
    if report.dropped_rows > 0 {
        warn!(dropped = report.dropped_rows, "rows dropped during cleaning");
    }
    info!(
        source = %path.display(),
        total = report.total_rows,
        kept = report.kept_rows,
        nulled = report.nulled_cells,
        "dataset loaded"
    );
    Ok((records, schema, report))
}

/// Clean one row. Returns `None` when a required field is absent or
/// unparseable. Impact figures that fail coercion (text, negative values)
/// become null and are counted in `nulled`.
fn clean_row(raw: RawRow, nulled: &mut usize) -> Option<DisasterRecord> {
    let year = parse_i64_safe(raw.year.as_deref()).and_then(|y| i32::try_from(y).ok())?;
    let country = non_blank(raw.country)?;
    let iso = non_blank(raw.iso)?;
    let disaster_type = non_blank(raw.disaster_type)?;
    let total_events =
        parse_i64_safe(raw.total_events.as_deref()).and_then(|n| u64::try_from(n).ok())?;

    let mut coerce = |cell: Option<String>, non_negative: bool| -> Option<f64> {
        let cell = non_blank(cell)?;
        let value = parse_f64_safe(Some(&cell)).filter(|v| !non_negative || *v >= 0.0);
        if value.is_none() {
            *nulled += 1;
        }
        value
    };

    Some(DisasterRecord {
        year,
        country,
        iso,
        disaster_group: non_blank(raw.disaster_group),
        disaster_subgroup: non_blank(raw.disaster_subgroup),
        disaster_type,
        disaster_subtype: non_blank(raw.disaster_subtype),
        total_events,
        total_affected: coerce(raw.total_affected, true),
        total_deaths: coerce(raw.total_deaths, true),
        total_damage_original: coerce(raw.total_damage_original, true),
        total_damage_adjusted: coerce(raw.total_damage_adjusted, true),
        cpi: coerce(raw.cpi, false),
    })
}
