// Assembles every dashboard view from one filtered snapshot.
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::aggregate::{self, Comparison};
use crate::config::DashboardConfig;
use crate::error::SchemaError;
use crate::filter::{self, Constraints};
use crate::store::RecordStore;
use crate::types::{
    Category, CategorySum, CountrySummaryRow, GeoSum, HierarchySum, Metric, RecentEventRow,
    YearCategorySum, YearSum,
};

/// Grouping columns and limits, resolved against the schema once.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardLayout {
    /// Secondary grouping for the stacked series and the parent ring of the
    /// hierarchy, picked from the configured fallback list. An error here
    /// only disables the two views that group by it.
    pub grouping: Result<Category, SchemaError>,
    pub hierarchy_child: Category,
    pub recent_limit: usize,
    pub zero_fill_years: bool,
}

impl DashboardLayout {
    pub fn resolve(store: &RecordStore, config: &DashboardConfig) -> Self {
        let grouping = store.schema().resolve(&config.grouping_fallback);
        match &grouping {
            Ok(picked) if Some(picked) != config.grouping_fallback.first() => {
                warn!(grouping = %picked, "preferred grouping column absent, falling back");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "no grouping column, grouped views disabled"),
        }
        DashboardLayout {
            grouping,
            hierarchy_child: Category::DisasterType,
            recent_limit: config.recent_limit,
            zero_fill_years: config.zero_fill_years,
        }
    }
}

/// A view that could not be built because its column is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnavailableView {
    pub view: &'static str,
    pub reason: String,
}

/// Everything the presentation layer needs for one query. All parts come
/// from the same filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardBundle {
    pub constraints: Constraints,
    pub rows: usize,
    pub comparison: Comparison,
    pub events_by_type: Vec<CategorySum>,
    pub damage_by_type: Vec<CategorySum>,
    pub events_by_year: Vec<YearSum>,
    pub affected_by_year: Vec<YearSum>,
    /// `None` when no grouping column could be resolved.
    pub grouping: Option<Category>,
    pub affected_by_year_and_group: Vec<YearCategorySum>,
    pub deaths_by_group_and_type: Vec<HierarchySum>,
    pub country_summary: Vec<CountrySummaryRow>,
    pub recent_events: Vec<RecentEventRow>,
    pub events_by_iso: Vec<GeoSum>,
    pub unavailable: Vec<UnavailableView>,
}

pub struct ViewAssembler {
    store: Arc<RecordStore>,
    layout: DashboardLayout,
    cache: Option<Mutex<HashMap<Constraints, Arc<DashboardBundle>>>>,
}

impl ViewAssembler {
    pub fn new(store: Arc<RecordStore>, config: &DashboardConfig) -> Self {
        let layout = DashboardLayout::resolve(&store, config);
        let cache = config.cache_results.then(|| Mutex::new(HashMap::new()));
        ViewAssembler { store, layout, cache }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn layout(&self) -> &DashboardLayout {
        &self.layout
    }

    /// Bundle for `constraints`, served from the cache when enabled. The
    /// dataset never changes, so entries are never evicted.
    pub fn assemble(&self, constraints: &Constraints) -> Arc<DashboardBundle> {
        let Some(cache) = &self.cache else {
            return Arc::new(self.build(constraints));
        };
        if let Some(hit) = lock(cache).get(constraints) {
            debug!(%constraints, "bundle cache hit");
            return Arc::clone(hit);
        }
        let bundle = Arc::new(self.build(constraints));
        lock(cache)
            .entry(constraints.clone())
            .or_insert_with(|| Arc::clone(&bundle))
            .clone()
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| lock(c).len())
    }

    /// Filter once and run every aggregation over that view.
    pub fn build(&self, constraints: &Constraints) -> DashboardBundle {
        let view = filter::filter(&self.store, constraints);
        let layout = &self.layout;
        let mut unavailable = Vec::new();

        let events_by_type = available(
            &mut unavailable,
            "events_by_type",
            aggregate::sum_by_category(&view, Category::DisasterType, Metric::TotalEvents),
        );
        let damage_by_type = available(
            &mut unavailable,
            "damage_by_type",
            aggregate::sum_by_category(&view, Category::DisasterType, Metric::TotalDamageOriginal),
        );
        let events_by_year = available(
            &mut unavailable,
            "events_by_year",
            aggregate::time_series(&view, Metric::TotalEvents, layout.zero_fill_years),
        );
        let affected_by_year = available(
            &mut unavailable,
            "affected_by_year",
            aggregate::time_series(&view, Metric::TotalAffected, layout.zero_fill_years),
        );
        let affected_by_year_and_group = available(
            &mut unavailable,
            "affected_by_year_and_group",
            layout.grouping.clone().and_then(|grouping| {
                aggregate::sum_by_year_and_category(&view, grouping, Metric::TotalAffected)
            }),
        );
        let deaths_by_group_and_type = available(
            &mut unavailable,
            "deaths_by_group_and_type",
            layout.grouping.clone().and_then(|grouping| {
                aggregate::sum_hierarchy(&view, grouping, layout.hierarchy_child, Metric::TotalDeaths)
            }),
        );

        info!(%constraints, rows = view.len(), "dashboard assembled");
        DashboardBundle {
            constraints: constraints.clone(),
            rows: view.len(),
            comparison: aggregate::compare(&view, constraints),
            events_by_type,
            damage_by_type,
            events_by_year,
            affected_by_year,
            grouping: layout.grouping.clone().ok(),
            affected_by_year_and_group,
            deaths_by_group_and_type,
            country_summary: aggregate::country_summary(&view),
            recent_events: aggregate::recent_events(&view, layout.recent_limit),
            events_by_iso: aggregate::events_by_iso(&view),
            unavailable,
        }
    }
}

fn available<T>(
    unavailable: &mut Vec<UnavailableView>,
    view: &'static str,
    result: Result<Vec<T>, SchemaError>,
) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!(view, error = %e, "view unavailable");
            unavailable.push(UnavailableView {
                view,
                reason: e.to_string(),
            });
            Vec::new()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Entries are inserted whole, so a poisoned map is still consistent.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;
    use crate::store::Schema;
    use crate::types::{Column, DisasterRecord};

    fn record(year: i32, country: &str, subgroup: &str, ty: &str, events: u64) -> DisasterRecord {
        DisasterRecord {
            year,
            country: country.to_string(),
            iso: country.to_uppercase(),
            disaster_subgroup: Some(subgroup.to_string()),
            disaster_type: ty.to_string(),
            total_events: events,
            total_affected: Some(events as f64 * 10.0),
            total_deaths: Some(events as f64),
            total_damage_original: Some(events as f64 * 1e6),
            ..Default::default()
        }
    }

    fn records() -> Vec<DisasterRecord> {
        vec![
            record(2019, "Chile", "Geophysical", "Earthquake", 2),
            record(2020, "Chile", "Hydrological", "Flood", 3),
            record(2020, "Peru", "Hydrological", "Flood", 1),
            record(2021, "Peru", "Meteorological", "Storm", 4),
        ]
    }

    fn assembler(schema: Schema, config: &DashboardConfig) -> ViewAssembler {
        ViewAssembler::new(Arc::new(RecordStore::new(records(), schema)), config)
    }

    #[test]
    fn bundle_views_agree_with_each_other() {
        let a = assembler(Schema::full(), &DashboardConfig::default());
        let bundle = a.build(&Constraints::years(2019, 2021));
        assert_eq!(bundle.rows, 4);
        assert_eq!(bundle.comparison.current.events, 10);
        let by_type: f64 = bundle.events_by_type.iter().map(|g| g.total).sum();
        let by_year: f64 = bundle.events_by_year.iter().map(|g| g.total).sum();
        let by_country: u64 = bundle.country_summary.iter().map(|c| c.total_events).sum();
        let by_iso: u64 = bundle.events_by_iso.iter().map(|g| g.total_events).sum();
        assert_eq!(by_type, 10.0);
        assert_eq!(by_year, 10.0);
        assert_eq!(by_country, 10);
        assert_eq!(by_iso, 10);
        assert_eq!(bundle.grouping, Some(Category::DisasterSubgroup));
        assert_eq!(bundle.comparison.previous_range, Some((2019, 2020)));
        assert_eq!(bundle.comparison.previous.events, 6);
        assert!(bundle.unavailable.is_empty());
    }

    #[test]
    fn grouping_falls_back_to_disaster_type() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::DisasterSubgroup));
        let a = assembler(schema, &DashboardConfig::default());
        assert_eq!(a.layout().grouping, Ok(Category::DisasterType));
        let bundle = a.build(&Constraints::years(2019, 2021));
        let labels: Vec<&str> = bundle
            .affected_by_year_and_group
            .iter()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Earthquake", "Flood", "Storm"]);
    }

    #[test]
    fn no_grouping_column_only_blanks_grouped_views() {
        let config = DashboardConfig {
            grouping_fallback: vec![Category::DisasterSubgroup],
            ..DashboardConfig::default()
        };
        let a = assembler(Schema::new(Column::REQUIRED), &config);
        assert_eq!(
            a.layout().grouping,
            Err(SchemaError::NoFallbackAvailable(vec![Column::DisasterSubgroup]))
        );

        let bundle = a.build(&Constraints::years(2019, 2021));
        assert_eq!(bundle.grouping, None);
        assert!(bundle.affected_by_year_and_group.is_empty());
        assert!(bundle.deaths_by_group_and_type.is_empty());
        let names: Vec<&str> = bundle.unavailable.iter().map(|u| u.view).collect();
        assert!(names.contains(&"affected_by_year_and_group"));
        assert!(names.contains(&"deaths_by_group_and_type"));
        assert_eq!(
            bundle.unavailable[names.len() - 1].reason,
            "none of the grouping columns are present: Disaster Subgroup"
        );

        // views that do not group by it are still produced
        assert_eq!(bundle.comparison.current.events, 10);
        assert_eq!(bundle.events_by_type.len(), 3);
        assert_eq!(bundle.country_summary.len(), 2);
        assert_eq!(bundle.recent_events.len(), 4);
        assert_eq!(bundle.events_by_iso.len(), 2);
    }

    #[test]
    fn missing_metric_only_blanks_its_views() {
        let schema = Schema::new(Column::ALL.into_iter().filter(|c| *c != Column::TotalAffected));
        let a = assembler(schema, &DashboardConfig::default());
        let bundle = a.build(&Constraints::years(2019, 2021));
        assert!(bundle.affected_by_year.is_empty());
        assert!(bundle.affected_by_year_and_group.is_empty());
        assert!(!bundle.events_by_year.is_empty());
        let names: Vec<&str> = bundle.unavailable.iter().map(|u| u.view).collect();
        assert_eq!(names, vec!["affected_by_year", "affected_by_year_and_group"]);
    }

    #[test]
    fn cache_returns_the_same_bundle() {
        let a = assembler(Schema::full(), &DashboardConfig::default());
        let constraints = Constraints::new(Selection::Only("Peru".to_string()), 2019, 2021, Selection::All);
        let first = a.assemble(&constraints);
        let second = a.assemble(&constraints);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(a.cached_queries(), 1);
        a.assemble(&Constraints::years(2019, 2021));
        assert_eq!(a.cached_queries(), 2);
    }

    #[test]
    fn concurrent_queries_share_one_store() {
        let a = Arc::new(assembler(Schema::full(), &DashboardConfig::default()));
        let handles: Vec<_> = (2019..=2021)
            .map(|year| {
                let a = Arc::clone(&a);
                std::thread::spawn(move || a.assemble(&Constraints::years(2019, year)).rows)
            })
            .collect();
        let rows: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(rows, vec![1, 3, 4]);
        assert_eq!(a.cached_queries(), 3);
    }

    #[test]
    fn cache_can_be_disabled() {
        let config = DashboardConfig {
            cache_results: false,
            ..DashboardConfig::default()
        };
        let a = assembler(Schema::full(), &config);
        let constraints = Constraints::years(2019, 2021);
        let first = a.assemble(&constraints);
        let second = a.assemble(&constraints);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert_eq!(a.cached_queries(), 0);
    }

    #[test]
    fn degenerate_range_builds_an_empty_bundle() {
        let a = assembler(Schema::full(), &DashboardConfig::default());
        let bundle = a.build(&Constraints::years(2050, 2000));
        assert_eq!(bundle.rows, 0);
        assert_eq!(bundle.comparison.current.events, 0);
        assert!(bundle.events_by_type.is_empty());
        assert!(bundle.recent_events.is_empty());
        assert!(bundle.unavailable.is_empty());
    }
}
