use assert_matches::assert_matches;
use disaster_dashboard::aggregate::Trend;
use disaster_dashboard::types::{Category, Column};
use disaster_dashboard::{
    Constraints, DashboardConfig, DataLoadError, RecordStore, Selection, ViewAssembler,
};
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

const SHEET: &str = "EM-DAT Version 2025-01-27";

const HEADERS: [&str; 9] = [
    "Year",
    "Country",
    "ISO",
    "Disaster Group",
    "Disaster Subgroup",
    "Disaster Type",
    "Total Events",
    "Total Affected",
    "Total Deaths",
];

fn write_workbook(path: &Path, sheet: &str) {
    let rows: [(f64, &str, &str, &str, &str, &str, f64, Option<f64>, Option<f64>); 4] = [
        (2020.0, "Chile", "CHL", "Natural", "Hydrological", "Flood", 3.0, Some(100.0), Some(4.0)),
        (2021.0, "Chile", "CHL", "Natural", "Hydrological", "Flood", 2.0, Some(50.0), None),
        (2021.0, "Peru", "PER", "Natural", "Meteorological", "Storm", 1.0, None, Some(9.0)),
        (2019.0, "Peru", "PER", "Natural", "Geophysical", "Earthquake", 1.0, Some(7.0), Some(1.0)),
    ];
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).unwrap();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        worksheet.write_number(r, 0, row.0).unwrap();
        worksheet.write_string(r, 1, row.1).unwrap();
        worksheet.write_string(r, 2, row.2).unwrap();
        worksheet.write_string(r, 3, row.3).unwrap();
        worksheet.write_string(r, 4, row.4).unwrap();
        worksheet.write_string(r, 5, row.5).unwrap();
        worksheet.write_number(r, 6, row.6).unwrap();
        if let Some(v) = row.7 {
            worksheet.write_number(r, 7, v).unwrap();
        }
        if let Some(v) = row.8 {
            worksheet.write_number(r, 8, v).unwrap();
        }
    }
    workbook.save(path).unwrap();
}

fn config_for(path: &Path) -> DashboardConfig {
    DashboardConfig {
        data_path: path.to_path_buf(),
        ..DashboardConfig::default()
    }
}

#[test]
fn loads_named_sheet_and_answers_queries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emdat.xlsx");
    write_workbook(&path, SHEET);
    let config = config_for(&path);

    let (store, report) = RecordStore::load(&config).unwrap();
    assert_eq!(report.kept_rows, 4);
    assert_eq!(report.dropped_rows, 0);
    assert!(report.columns.contains(&Column::DisasterSubgroup));
    assert!(!report.columns.contains(&Column::TotalDamageOriginal));
    assert_eq!(store.years(), [2019, 2020, 2021]);
    assert_eq!(store.countries(), ["Chile", "Peru"]);

    let assembler = ViewAssembler::new(Arc::new(store), &config);
    let constraints = Constraints::new(Selection::Only("Chile".to_string()), 2020, 2021, Selection::All);
    let bundle = assembler.assemble(&constraints);

    assert_eq!(bundle.comparison.current.events, 5);
    assert_eq!(bundle.comparison.current.affected.total, 150.0);
    assert_eq!(bundle.comparison.events.delta, 2.0);
    assert_eq!(bundle.comparison.affected.delta, 50.0);
    assert_eq!(bundle.comparison.affected.trend, Trend::Worsened);
    let series: Vec<(i32, f64)> = bundle.affected_by_year.iter().map(|s| (s.year, s.total)).collect();
    assert_eq!(series, vec![(2020, 100.0), (2021, 50.0)]);
    assert_eq!(bundle.grouping, Some(Category::DisasterSubgroup));

    // damage column is absent from the sheet: only the damage view is lost
    let names: Vec<&str> = bundle.unavailable.iter().map(|u| u.view).collect();
    assert_eq!(names, vec!["damage_by_type"]);
    assert_eq!(bundle.comparison.current.damage.missing, 2);
}

#[test]
fn missing_sheet_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emdat.xlsx");
    write_workbook(&path, "Sheet1");
    let err = RecordStore::load(&config_for(&path)).unwrap_err();
    assert_matches!(err, DataLoadError::SheetNotFound { sheet, available } => {
        assert_eq!(sheet, SHEET);
        assert_eq!(available, vec!["Sheet1".to_string()]);
    });
}

#[test]
fn csv_without_subgroup_falls_back_to_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emdat.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        "Year,Country,ISO,Disaster Type,Total Events,Total Affected,Total Deaths,\"Total Damage (USD, original)\"\n\
         2010,Haiti,HTI,Earthquake,1,\"3,700,000\",222570,8000000000\n\
         2010,Chile,CHL,Earthquake,1,2671556,562,30000000000\n\
         2010,Chile,CHL,Flood,2,,,\n"
    )
    .unwrap();
    drop(file);

    let config = config_for(&path);
    let (store, _) = RecordStore::load(&config).unwrap();
    let assembler = ViewAssembler::new(Arc::new(store), &config);
    assert_eq!(assembler.layout().grouping, Ok(Category::DisasterType));

    let constraints = Constraints::years(2010, 2010);
    let bundle = assembler.assemble(&constraints);
    assert!(bundle.unavailable.is_empty());
    assert_eq!(bundle.comparison.previous_range, None);
    assert_eq!(bundle.comparison.events.delta, 4.0);
    assert_eq!(bundle.comparison.current.affected.total, 6_371_556.0);
    assert_eq!(bundle.comparison.current.affected.missing, 1);
    assert_eq!(bundle.comparison.current.damage_millions, 38_000.0);

    let by_type: Vec<(&str, f64)> = bundle
        .events_by_type
        .iter()
        .map(|g| (g.label.as_str(), g.total))
        .collect();
    assert_eq!(by_type, vec![("Earthquake", 2.0), ("Flood", 2.0)]);

    assert_eq!(bundle.country_summary[0].country, "Chile");
    assert_eq!(bundle.country_summary[0].total_events, 3);
    assert_eq!(bundle.events_by_iso.len(), 2);
    assert_eq!(bundle.recent_events.len(), 3);

    let tree: Vec<(&str, &str, f64)> = bundle
        .deaths_by_group_and_type
        .iter()
        .map(|h| (h.parent.as_str(), h.child.as_str(), h.total))
        .collect();
    assert_eq!(
        tree,
        vec![("Earthquake", "Earthquake", 223_132.0), ("Flood", "Flood", 0.0)]
    );
}

#[test]
fn empty_query_range_returns_an_empty_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emdat.xlsx");
    write_workbook(&path, SHEET);
    let config = config_for(&path);
    let (store, _) = RecordStore::load(&config).unwrap();
    let assembler = ViewAssembler::new(Arc::new(store), &config);

    let bundle = assembler.assemble(&Constraints::years(2050, 2000));
    assert_eq!(bundle.rows, 0);
    assert_eq!(bundle.comparison.current.events, 0);
    assert_eq!(bundle.comparison.events.trend, Trend::Unchanged);
    assert!(bundle.events_by_year.is_empty());
    assert!(bundle.country_summary.is_empty());
}
