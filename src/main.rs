// Entry point and interactive CLI flow.
//
// - Option [1] loads and cleans the dataset, printing diagnostics.
// - Option [2] asks for a country, year range and disaster type, prints the
//   dashboard and exports it.
// After a query the user can go back to the menu or exit.
use disaster_dashboard::aggregate::{Comparison, MetricDelta, Trend};
use disaster_dashboard::loader::LoadReport;
use disaster_dashboard::util::{format_int, format_number, format_signed};
use disaster_dashboard::{
    output, Constraints, DashboardBundle, DashboardConfig, DashboardError, RecordStore,
    Selection, ViewAssembler,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Read a single trimmed line after printing `prompt`. `None` once the
/// input is closed or unreadable.
fn read_line(input: &mut impl BufRead, prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Ask whether to go back to the menu. `true` for `Y`, `false` for `N` or
/// closed input.
fn prompt_back_to_menu(input: &mut impl BufRead) -> bool {
    loop {
        let Some(answer) = read_line(input, "Back to Query Selection (Y/N): ") else {
            return false;
        };
        match answer.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Prompt for a year, falling back to `default` on blank or invalid input.
fn read_year(input: &mut impl BufRead, label: &str, default: i32) -> Option<i32> {
    let answer = read_line(input, &format!("{} [{}]: ", label, default))?;
    if answer.is_empty() {
        return Some(default);
    }
    Some(answer.parse().unwrap_or_else(|_| {
        println!("Not a year, using {}.", default);
        default
    }))
}

fn print_load_report(report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        format_int(report.total_rows as u64),
        format_int(report.kept_rows as u64)
    );
    if report.dropped_rows > 0 {
        println!(
            "Note: {} rows dropped for missing Year, Country, ISO, Disaster Type or Total Events.",
            format_int(report.dropped_rows as u64)
        );
    }
    if report.nulled_cells > 0 {
        println!(
            "Note: {} numeric cells could not be read and are treated as unknown.",
            format_int(report.nulled_cells as u64)
        );
    }
    println!("Loaded at {}\n", report.loaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
}

/// Handle option [1]: load the dataset and build the assembler.
fn handle_load(config: &DashboardConfig) -> Option<ViewAssembler> {
    let (store, report) = match RecordStore::load(config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load {}: {}\n", config.data_path.display(), e);
            return None;
        }
    };
    print_load_report(&report);
    Some(ViewAssembler::new(Arc::new(store), config))
}

fn read_constraints(
    input: &mut impl BufRead,
    assembler: &ViewAssembler,
    config: &DashboardConfig,
) -> Option<Constraints> {
    let store = assembler.store();
    let defaults = Constraints::default_for(store, config);
    println!(
        "{} countries, {} disaster types, years {}",
        format_int(store.countries().len() as u64),
        format_int(store.disaster_types().len() as u64),
        store
            .year_bounds()
            .map(|(a, b)| format!("{}-{}", a, b))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("Types: {}", store.disaster_types().join(", "));
    let country = Selection::from_choice(&read_line(input, "Country [all]: ")?);
    let year_start = read_year(input, "Start year", defaults.year_start)?;
    let year_end = read_year(input, "End year", defaults.year_end)?;
    let disaster_type = Selection::from_choice(&read_line(input, "Disaster type [all]: ")?);
    Some(Constraints::new(country, year_start, year_end, disaster_type))
}

fn metric_line(label: &str, value: &MetricDelta, decimals: usize) {
    let trend = match value.trend {
        Trend::Improved => "improved",
        Trend::Worsened => "worsened",
        Trend::Unchanged => "unchanged",
    };
    println!(
        "{:<30} {:>20}  ({}, {})",
        label,
        format_number(value.current, decimals),
        format_signed(value.delta, decimals),
        trend
    );
}

fn print_metrics(comparison: &Comparison) {
    match comparison.previous_range {
        Some((start, end)) => println!("Compared with {}-{}:", start, end),
        None => println!("No previous period to compare with."),
    }
    metric_line("Total Events", &comparison.events, 0);
    metric_line("People Affected", &comparison.affected, 0);
    metric_line("Total Deaths", &comparison.deaths, 0);
    metric_line("Total Damage (Millions USD)", &comparison.damage_millions, 2);
    let current = &comparison.current;
    if current.affected.missing + current.deaths.missing + current.damage.missing > 0 {
        println!(
            "Unknown values: affected {}, deaths {}, damage {} rows",
            format_int(current.affected.missing as u64),
            format_int(current.deaths.missing as u64),
            format_int(current.damage.missing as u64)
        );
    }
    println!();
}

fn print_bundle(bundle: &DashboardBundle) {
    println!("Natural Disaster Dashboard ({})\n", bundle.constraints);
    print_metrics(&bundle.comparison);
    output::preview_table("Events by Disaster Type", &bundle.events_by_type, 10);
    output::preview_table("Economic Damage by Disaster Type (USD)", &bundle.damage_by_type, 10);
    output::preview_table("Events per Year", &bundle.events_by_year, 30);
    let group = bundle
        .grouping
        .map(|g| g.to_string())
        .unwrap_or_else(|| "Group".to_string());
    output::preview_table(
        &format!("People Affected per Year and {}", group),
        &bundle.affected_by_year_and_group,
        20,
    );
    output::preview_table(
        &format!("Deaths by {} and Disaster Type", group),
        &bundle.deaths_by_group_and_type,
        20,
    );
    output::preview_table("Disaster Summary by Country", &bundle.country_summary, 10);
    output::preview_table("Recent Disasters", &bundle.recent_events, 10);
    output::preview_table("Events by ISO Code", &bundle.events_by_iso, 10);
    for missing in &bundle.unavailable {
        println!("View {} unavailable: {}", missing.view, missing.reason);
    }
}

/// Handle option [2]: run one query, print it and export it. `Ok(false)`
/// when the input closed before the query was complete.
fn handle_query(
    input: &mut impl BufRead,
    assembler: &ViewAssembler,
    config: &DashboardConfig,
) -> Result<bool, DashboardError> {
    let Some(constraints) = read_constraints(input, assembler, config) else {
        return Ok(false);
    };
    println!();
    let bundle = assembler.assemble(&constraints);
    print_bundle(&bundle);
    let (json_path, csv_path) = output::export_bundle(&config.export_dir, &bundle)?;
    println!(
        "(Full results exported to {} and {})\n",
        json_path.display(),
        csv_path.display()
    );
    Ok(true)
}

/// Menu loop. Returns when the user exits or the input is closed.
fn run(input: &mut impl BufRead, config: &DashboardConfig) {
    let mut assembler: Option<ViewAssembler> = None;
    loop {
        println!("Natural Disaster Dashboard");
        println!("[1] Load the dataset ({})", config.data_path.display());
        println!("[2] Query the dashboard");
        println!("[3] Exit\n");
        let Some(choice) = read_line(input, "Enter choice: ") else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => {
                if let Some(loaded) = handle_load(config) {
                    assembler = Some(loaded);
                }
            }
            "2" => {
                println!();
                let Some(active) = assembler.as_ref() else {
                    println!("Error: No data loaded. Please load the dataset first (option 1).\n");
                    continue;
                };
                match handle_query(input, active, config) {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("\nExiting the program.");
                        break;
                    }
                    Err(e) => eprintln!("Export error: {}\n", e),
                }
                if !prompt_back_to_menu(input) {
                    println!("Exiting the program.");
                    break;
                }
            }
            "3" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1, 2 or 3.\n"),
        }
    }
}

fn main() -> Result<(), DashboardError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = DashboardConfig::discover()?;
    run(&mut io::stdin().lock(), &config);
    Ok(())
}
