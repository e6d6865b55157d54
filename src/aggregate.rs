// Aggregations over a `FilteredView`.
//
// Null policy: a null value contributes nothing to a sum and is counted in
// the `missing` field that travels with it. Nothing here fails on an empty
// view; grouping on a column the dataset lacks yields a `SchemaError`.
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::SchemaError;
use crate::filter::{Constraints, FilteredView, Predicate};
use crate::types::{
    Category, CategorySum, CountrySummaryRow, DisasterRecord, GeoSum, HierarchySum, Metric,
    RecentEventRow, YearCategorySum, YearSum,
};

/// A sum that remembers how many rows had nothing to add.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSum {
    pub total: f64,
    pub missing: usize,
}

impl MetricSum {
    fn add(&mut self, value: Option<f64>) {
        match value {
            Some(v) => self.total += v,
            None => self.missing += 1,
        }
    }
}

/// Headline figures of a view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub rows: usize,
    pub events: u64,
    pub affected: MetricSum,
    pub deaths: MetricSum,
    /// Original (unadjusted) USD.
    pub damage: MetricSum,
    pub damage_millions: f64,
}

pub fn totals(view: &FilteredView<'_>) -> Totals {
    let mut t = Totals {
        rows: view.len(),
        ..Totals::default()
    };
    for r in view.iter() {
        t.events = t.events.saturating_add(r.total_events);
        t.affected.add(r.total_affected);
        t.deaths.add(r.total_deaths);
        t.damage.add(r.total_damage_original);
    }
    t.damage_millions = t.damage.total / 1e6;
    t
}

/// Direction of a change in an impact metric. Every metric counts harm, so
/// a rise is a worsening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improved,
    Worsened,
    Unchanged,
}

impl Trend {
    pub fn of(delta: f64) -> Self {
        match delta.partial_cmp(&0.0) {
            Some(Ordering::Greater) => Trend::Worsened,
            Some(Ordering::Less) => Trend::Improved,
            _ => Trend::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricDelta {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub trend: Trend,
}

impl MetricDelta {
    fn new(current: f64, previous: f64) -> Self {
        let delta = current - previous;
        MetricDelta {
            current,
            previous,
            delta,
            trend: Trend::of(delta),
        }
    }
}

/// Current totals against the previous period `[year_start, year_end - 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// `None` when the range covers a single year (or none); previous
    /// totals are then all zero.
    pub previous_range: Option<(i32, i32)>,
    pub current: Totals,
    pub previous: Totals,
    pub events: MetricDelta,
    pub affected: MetricDelta,
    pub deaths: MetricDelta,
    pub damage_millions: MetricDelta,
}

/// Compare `view` (already filtered by `constraints`) with its previous
/// period. The previous period is a sub-range of the current one, so it is
/// taken from the same view rather than re-filtering the store.
pub fn compare(view: &FilteredView<'_>, constraints: &Constraints) -> Comparison {
    let current = totals(view);
    let previous_range = constraints.previous_period();
    let previous = match previous_range {
        Some((start, end)) => totals(&view.refine(&[Predicate::YearRange { start, end }])),
        None => Totals::default(),
    };
    Comparison {
        previous_range,
        events: MetricDelta::new(current.events as f64, previous.events as f64),
        affected: MetricDelta::new(current.affected.total, previous.affected.total),
        deaths: MetricDelta::new(current.deaths.total, previous.deaths.total),
        damage_millions: MetricDelta::new(current.damage_millions, previous.damage_millions),
        current,
        previous,
    }
}

/// Sum `metric` per key. Rows whose key is null are left out, as are their
/// values.
fn sum_by<'a, K, F>(view: &FilteredView<'a>, metric: Metric, key: F) -> BTreeMap<K, MetricSum>
where
    K: Ord,
    F: Fn(&'a DisasterRecord) -> Option<K>,
{
    let mut groups: BTreeMap<K, MetricSum> = BTreeMap::new();
    for r in view.iter() {
        if let Some(k) = key(r) {
            groups.entry(k).or_default().add(r.metric(metric));
        }
    }
    groups
}

/// Sum `metric` per value of `category`, largest first. Ties keep label order.
pub fn sum_by_category(
    view: &FilteredView<'_>,
    category: Category,
    metric: Metric,
) -> Result<Vec<CategorySum>, SchemaError> {
    view.schema().require_category(category)?;
    view.schema().require_metric(metric)?;
    let mut rows: Vec<CategorySum> = sum_by(view, metric, |r| r.category(category))
        .into_iter()
        .map(|(label, sum)| CategorySum {
            label: label.to_string(),
            total: sum.total,
            missing: sum.missing,
        })
        .collect();
    rows.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    Ok(rows)
}

/// Widest span `time_series` will zero-fill.
pub const MAX_FILLED_YEARS: i64 = 1000;

/// Sum `metric` per year, ascending. With `zero_fill`, every year between
/// the first and last observed year is present, unless that span is wider
/// than [`MAX_FILLED_YEARS`], in which case the series stays sparse.
pub fn time_series(
    view: &FilteredView<'_>,
    metric: Metric,
    zero_fill: bool,
) -> Result<Vec<YearSum>, SchemaError> {
    view.schema().require_metric(metric)?;
    let mut groups = sum_by(view, metric, |r| Some(r.year));
    if zero_fill {
        let bounds = groups.keys().next().copied().zip(groups.keys().next_back().copied());
        if let Some((first, last)) = bounds {
            let span = i64::from(last) - i64::from(first) + 1;
            if span <= MAX_FILLED_YEARS {
                for year in first..=last {
                    groups.entry(year).or_default();
                }
            } else {
                warn!(first, last, "year span too wide to zero-fill, series left sparse");
            }
        }
    }
    Ok(groups
        .into_iter()
        .map(|(year, sum)| YearSum {
            year,
            total: sum.total,
            missing: sum.missing,
        })
        .collect())
}

/// Sum `metric` per (year, category), ordered by year then label.
pub fn sum_by_year_and_category(
    view: &FilteredView<'_>,
    category: Category,
    metric: Metric,
) -> Result<Vec<YearCategorySum>, SchemaError> {
    view.schema().require_category(category)?;
    view.schema().require_metric(metric)?;
    Ok(sum_by(view, metric, |r| r.category(category).map(|label| (r.year, label)))
        .into_iter()
        .map(|((year, label), sum)| YearCategorySum {
            year,
            label: label.to_string(),
            total: sum.total,
            missing: sum.missing,
        })
        .collect())
}

/// Two-level breakdown `parent -> child`, ordered by parent then child.
pub fn sum_hierarchy(
    view: &FilteredView<'_>,
    parent: Category,
    child: Category,
    metric: Metric,
) -> Result<Vec<HierarchySum>, SchemaError> {
    view.schema().require_category(parent)?;
    view.schema().require_category(child)?;
    view.schema().require_metric(metric)?;
    Ok(sum_by(view, metric, |r| r.category(parent).zip(r.category(child)))
        .into_iter()
        .map(|((parent, child), sum)| HierarchySum {
            parent: parent.to_string(),
            child: child.to_string(),
            total: sum.total,
            missing: sum.missing,
        })
        .collect())
}

/// Per-country sums, most events first. Ties keep country order.
pub fn country_summary(view: &FilteredView<'_>) -> Vec<CountrySummaryRow> {
    #[derive(Default)]
    struct Acc {
        events: u64,
        affected: f64,
        deaths: f64,
        damage: f64,
        incomplete: usize,
    }
    let mut map: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in view.iter() {
        let e = map.entry(r.country.as_str()).or_default();
        e.events = e.events.saturating_add(r.total_events);
        e.affected += r.total_affected.unwrap_or(0.0);
        e.deaths += r.total_deaths.unwrap_or(0.0);
        e.damage += r.total_damage_original.unwrap_or(0.0);
        if r.total_affected.is_none() || r.total_deaths.is_none() || r.total_damage_original.is_none() {
            e.incomplete += 1;
        }
    }
    let mut rows: Vec<CountrySummaryRow> = map
        .into_iter()
        .map(|(country, acc)| CountrySummaryRow {
            country: country.to_string(),
            total_events: acc.events,
            total_affected: acc.affected,
            total_deaths: acc.deaths,
            total_damage: acc.damage,
            incomplete_rows: acc.incomplete,
        })
        .collect();
    rows.sort_by(|a, b| b.total_events.cmp(&a.total_events));
    rows
}

/// The `limit` most recent rows, newest year first. Rows of the same year
/// keep store order.
pub fn recent_events(view: &FilteredView<'_>, limit: usize) -> Vec<RecentEventRow> {
    let mut rows: Vec<&DisasterRecord> = view.iter().collect();
    rows.sort_by(|a, b| b.year.cmp(&a.year));
    rows.into_iter()
        .take(limit)
        .map(|r| RecentEventRow {
            country: r.country.clone(),
            disaster_type: r.disaster_type.clone(),
            year: r.year,
            total_events: r.total_events,
            total_affected: r.total_affected,
        })
        .collect()
}

/// Events per ISO code, ordered by code. The label is the first country
/// name seen for the code.
pub fn events_by_iso(view: &FilteredView<'_>) -> Vec<GeoSum> {
    let mut map: BTreeMap<&str, (&str, u64)> = BTreeMap::new();
    for r in view.iter() {
        let e = map.entry(r.iso.as_str()).or_insert((r.country.as_str(), 0));
        e.1 = e.1.saturating_add(r.total_events);
    }
    map.into_iter()
        .map(|(iso, (country, total_events))| GeoSum {
            iso: iso.to_string(),
            country: country.to_string(),
            total_events,
        })
        .collect()
}
