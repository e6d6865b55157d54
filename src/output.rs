use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::error::ExportError;
use crate::view::DashboardBundle;

pub const BUNDLE_FILE: &str = "dashboard_bundle.json";
pub const COUNTRY_SUMMARY_FILE: &str = "country_summary.csv";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

#[derive(Serialize)]
struct Export<'a> {
    generated_at: DateTime<Utc>,
    bundle: &'a DashboardBundle,
}

/// Write the full bundle as JSON and the per-country table as CSV into
/// `dir`. Returns the two paths written.
pub fn export_bundle(dir: &Path, bundle: &DashboardBundle) -> Result<(PathBuf, PathBuf), ExportError> {
    std::fs::create_dir_all(dir)?;
    let json_path = dir.join(BUNDLE_FILE);
    write_json(
        &json_path,
        &Export {
            generated_at: Utc::now(),
            bundle,
        },
    )?;
    let csv_path = dir.join(COUNTRY_SUMMARY_FILE);
    write_csv(&csv_path, &bundle.country_summary)?;
    info!(json = %json_path.display(), csv = %csv_path.display(), "bundle exported");
    Ok((json_path, csv_path))
}

pub fn preview_table<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", title);
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}", table_str);
    if rows.len() > max_rows {
        println!("({} more rows)", rows.len() - max_rows);
    }
    println!();
}
