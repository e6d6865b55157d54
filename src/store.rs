// The immutable, typed record store every query runs against.
use std::collections::BTreeSet;

use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::{DataLoadError, SchemaError};
use crate::loader::{self, LoadReport};
use crate::types::{Category, Column, DisasterRecord, Metric};

/// Columns present in the loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeSet<Column>,
}

impl Schema {
    pub fn new<I: IntoIterator<Item = Column>>(columns: I) -> Self {
        Schema {
            columns: columns.into_iter().collect(),
        }
    }

    /// Schema with every known column, for stores built in memory.
    pub fn full() -> Self {
        Schema::new(Column::ALL)
    }

    pub fn contains(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn require(&self, column: Column) -> Result<(), SchemaError> {
        if self.contains(column) {
            Ok(())
        } else {
            Err(SchemaError::MissingColumn(column))
        }
    }

    pub fn require_category(&self, category: Category) -> Result<(), SchemaError> {
        self.require(category.column())
    }

    pub fn require_metric(&self, metric: Metric) -> Result<(), SchemaError> {
        self.require(metric.column())
    }

    /// First candidate present in the schema.
    pub fn resolve(&self, candidates: &[Category]) -> Result<Category, SchemaError> {
        candidates
            .iter()
            .copied()
            .find(|c| self.contains(c.column()))
            .ok_or_else(|| {
                SchemaError::NoFallbackAvailable(candidates.iter().map(|c| c.column()).collect())
            })
    }
}

/// Cleaned dataset plus the distinct values used to populate selection
/// controls. Built once; shared read-only (wrap it in an `Arc`).
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<DisasterRecord>,
    schema: Schema,
    countries: Vec<String>,
    years: Vec<i32>,
    disaster_types: Vec<String>,
}

impl RecordStore {
    pub fn new(records: Vec<DisasterRecord>, schema: Schema) -> Self {
        let countries: BTreeSet<&str> = records.iter().map(|r| r.country.as_str()).collect();
        let years: BTreeSet<i32> = records.iter().map(|r| r.year).collect();
        let types: BTreeSet<&str> = records.iter().map(|r| r.disaster_type.as_str()).collect();
        let countries = countries.into_iter().map(str::to_string).collect();
        let years = years.into_iter().collect();
        let disaster_types = types.into_iter().map(str::to_string).collect();
        let store = RecordStore {
            records,
            schema,
            countries,
            years,
            disaster_types,
        };
        debug!(
            records = store.records.len(),
            countries = store.countries.len(),
            years = store.years.len(),
            types = store.disaster_types.len(),
            "record store built"
        );
        store
    }

    /// Read and clean the dataset named by `config`.
    pub fn load(config: &DashboardConfig) -> Result<(Self, LoadReport), DataLoadError> {
        let (records, schema, report) = loader::load_and_clean(&config.data_path, &config.sheet_name)?;
        Ok((RecordStore::new(records, schema), report))
    }

    pub fn records(&self) -> &[DisasterRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Distinct countries, sorted.
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Distinct disaster types, sorted.
    pub fn disaster_types(&self) -> &[String] {
        &self.disaster_types
    }

    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        Some((*self.years.first()?, *self.years.last()?))
    }
}
