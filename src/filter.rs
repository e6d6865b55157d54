// Constraint sets and the filtered views they produce.
//
// Filtering never touches the store: a `FilteredView` only borrows the
// rows that satisfy every predicate. Predicates are independent row tests,
// so the order they are applied in does not change the result.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DashboardConfig;
use crate::store::{RecordStore, Schema};
use crate::types::DisasterRecord;

/// A categorical constraint: everything, or exactly one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// Interpret a user choice. Blank input and `all` (any case) select everything.
    pub fn from_choice(choice: &str) -> Self {
        let choice = choice.trim();
        if choice.is_empty() || choice.eq_ignore_ascii_case("all") {
            Selection::All
        } else {
            Selection::Only(choice.to_string())
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Selection::All => None,
            Selection::Only(v) => Some(v.as_str()),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Only(v) => f.write_str(v),
        }
    }
}

/// The user's query: country, inclusive year range, disaster type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraints {
    pub country: Selection,
    pub year_start: i32,
    pub year_end: i32,
    pub disaster_type: Selection,
}

impl Constraints {
    pub fn new(country: Selection, year_start: i32, year_end: i32, disaster_type: Selection) -> Self {
        Constraints {
            country,
            year_start,
            year_end,
            disaster_type,
        }
    }

    /// All countries and types over `[year_start, year_end]`.
    pub fn years(year_start: i32, year_end: i32) -> Self {
        Constraints::new(Selection::All, year_start, year_end, Selection::All)
    }

    /// The initial selection: all countries and types, configured default
    /// years clamped to what the store holds.
    pub fn default_for(store: &RecordStore, config: &DashboardConfig) -> Self {
        let (start, end) = match store.year_bounds() {
            Some((min, max)) => (
                config.default_year_start.clamp(min, max),
                config.default_year_end.clamp(min, max),
            ),
            None => (config.default_year_start, config.default_year_end),
        };
        Constraints::years(start, end)
    }

    pub fn is_empty_range(&self) -> bool {
        self.year_start > self.year_end
    }

    /// `[year_start, year_end - 1]` when the range spans more than one year.
    pub fn previous_period(&self) -> Option<(i32, i32)> {
        if self.year_end > self.year_start {
            Some((self.year_start, self.year_end - 1))
        } else {
            None
        }
    }

    pub fn predicates(&self) -> Vec<Predicate<'_>> {
        let mut predicates = Vec::with_capacity(3);
        if let Some(country) = self.country.value() {
            predicates.push(Predicate::Country(country));
        }
        predicates.push(Predicate::YearRange {
            start: self.year_start,
            end: self.year_end,
        });
        if let Some(ty) = self.disaster_type.value() {
            predicates.push(Predicate::DisasterType(ty));
        }
        predicates
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "country={} years={}..={} type={}",
            self.country, self.year_start, self.year_end, self.disaster_type
        )
    }
}

/// A single row test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'a> {
    Country(&'a str),
    /// Inclusive. `start > end` matches nothing.
    YearRange { start: i32, end: i32 },
    DisasterType(&'a str),
}

impl Predicate<'_> {
    pub fn matches(&self, record: &DisasterRecord) -> bool {
        match *self {
            Predicate::Country(country) => record.country == country,
            Predicate::YearRange { start, end } => start <= record.year && record.year <= end,
            Predicate::DisasterType(ty) => record.disaster_type == ty,
        }
    }
}

/// Read-only subset of the store's rows, in store order.
#[derive(Debug, Clone)]
pub struct FilteredView<'s> {
    rows: Vec<&'s DisasterRecord>,
    schema: &'s Schema,
}

impl<'s> FilteredView<'s> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[&'s DisasterRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'s DisasterRecord> + '_ {
        self.rows.iter().copied()
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Narrow this view further. Equivalent to filtering the store with the
    /// union of both predicate sets.
    pub fn refine(&self, predicates: &[Predicate<'_>]) -> FilteredView<'s> {
        FilteredView {
            rows: self
                .iter()
                .filter(|r| predicates.iter().all(|p| p.matches(r)))
                .collect(),
            schema: self.schema,
        }
    }
}

pub fn filter<'s>(store: &'s RecordStore, constraints: &Constraints) -> FilteredView<'s> {
    if constraints.is_empty_range() {
        return FilteredView {
            rows: Vec::new(),
            schema: store.schema(),
        };
    }
    filter_with(store, &constraints.predicates())
}

/// Apply an arbitrary conjunction of predicates.
pub fn filter_with<'s>(store: &'s RecordStore, predicates: &[Predicate<'_>]) -> FilteredView<'s> {
    FilteredView {
        rows: store
            .records()
            .iter()
            .filter(|r| predicates.iter().all(|p| p.matches(r)))
            .collect(),
        schema: store.schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, country: &str, ty: &str) -> DisasterRecord {
        DisasterRecord {
            year,
            country: country.to_string(),
            iso: country.to_uppercase(),
            disaster_type: ty.to_string(),
            total_events: 1,
            ..Default::default()
        }
    }

    fn store() -> RecordStore {
        RecordStore::new(
            vec![
                record(2018, "A", "Flood"),
                record(2019, "A", "Storm"),
                record(2020, "B", "Flood"),
                record(2021, "A", "Flood"),
                record(2022, "B", "Storm"),
            ],
            Schema::full(),
        )
    }

    #[test]
    fn all_selections_bypass_the_filter() {
        let store = store();
        let view = filter(&store, &Constraints::years(2000, 2030));
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn year_range_is_inclusive() {
        let store = store();
        let view = filter(&store, &Constraints::years(2019, 2021));
        let years: Vec<i32> = view.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
    }

    #[test]
    fn filters_compose_conjunctively() {
        let store = store();
        let constraints = Constraints::new(
            Selection::Only("A".to_string()),
            2018,
            2021,
            Selection::Only("Flood".to_string()),
        );
        let view = filter(&store, &constraints);
        let years: Vec<i32> = view.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2018, 2021]);
    }

    #[test]
    fn inverted_range_is_empty_not_an_error() {
        let store = store();
        let view = filter(&store, &Constraints::years(2050, 2000));
        assert!(view.is_empty());
    }

    #[test]
    fn unknown_country_yields_empty_view() {
        let store = store();
        let constraints = Constraints::new(Selection::Only("Z".to_string()), 2000, 2030, Selection::All);
        assert!(filter(&store, &constraints).is_empty());
    }

    #[test]
    fn refine_matches_direct_filter() {
        let store = store();
        let view = filter(&store, &Constraints::years(2018, 2022));
        let refined = view.refine(&[Predicate::YearRange { start: 2018, end: 2021 }]);
        let direct = filter(&store, &Constraints::years(2018, 2021));
        assert_eq!(refined.rows(), direct.rows());
    }

    #[test]
    fn previous_period_requires_two_years() {
        assert_eq!(Constraints::years(2010, 2012).previous_period(), Some((2010, 2011)));
        assert_eq!(Constraints::years(2010, 2010).previous_period(), None);
        assert_eq!(Constraints::years(2012, 2010).previous_period(), None);
    }

    #[test]
    fn choice_parsing() {
        assert_eq!(Selection::from_choice(""), Selection::All);
        assert_eq!(Selection::from_choice(" ALL "), Selection::All);
        assert_eq!(Selection::from_choice(" Chile"), Selection::Only("Chile".to_string()));
    }

    #[test]
    fn default_selection_is_clamped_to_store_years() {
        let store = store();
        let config = DashboardConfig::default();
        let constraints = Constraints::default_for(&store, &config);
        assert_eq!(constraints, Constraints::years(2018, 2022));
    }
}
