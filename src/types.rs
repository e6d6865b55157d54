use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tabled::Tabled;

use crate::util::{display_amount, display_opt_amount};

/// Every column the dashboard understands, named by its spreadsheet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "Year")]
    Year,
    #[serde(rename = "Country")]
    Country,
    #[serde(rename = "ISO")]
    Iso,
    #[serde(rename = "Disaster Group")]
    DisasterGroup,
    #[serde(rename = "Disaster Subgroup")]
    DisasterSubgroup,
    #[serde(rename = "Disaster Type")]
    DisasterType,
    #[serde(rename = "Disaster Subtype")]
    DisasterSubtype,
    #[serde(rename = "Total Events")]
    TotalEvents,
    #[serde(rename = "Total Affected")]
    TotalAffected,
    #[serde(rename = "Total Deaths")]
    TotalDeaths,
    #[serde(rename = "Total Damage (USD, original)")]
    TotalDamageOriginal,
    #[serde(rename = "Total Damage (USD, adjusted)")]
    TotalDamageAdjusted,
    #[serde(rename = "CPI")]
    Cpi,
}

static HEADER_LOOKUP: Lazy<HashMap<&'static str, Column>> =
    Lazy::new(|| Column::ALL.iter().map(|c| (c.header(), *c)).collect());

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Year,
        Column::Country,
        Column::Iso,
        Column::DisasterGroup,
        Column::DisasterSubgroup,
        Column::DisasterType,
        Column::DisasterSubtype,
        Column::TotalEvents,
        Column::TotalAffected,
        Column::TotalDeaths,
        Column::TotalDamageOriginal,
        Column::TotalDamageAdjusted,
        Column::Cpi,
    ];

    /// Columns a row must carry to survive ingestion.
    pub const REQUIRED: [Column; 5] = [
        Column::Year,
        Column::DisasterType,
        Column::Iso,
        Column::Country,
        Column::TotalEvents,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Year => "Year",
            Column::Country => "Country",
            Column::Iso => "ISO",
            Column::DisasterGroup => "Disaster Group",
            Column::DisasterSubgroup => "Disaster Subgroup",
            Column::DisasterType => "Disaster Type",
            Column::DisasterSubtype => "Disaster Subtype",
            Column::TotalEvents => "Total Events",
            Column::TotalAffected => "Total Affected",
            Column::TotalDeaths => "Total Deaths",
            Column::TotalDamageOriginal => "Total Damage (USD, original)",
            Column::TotalDamageAdjusted => "Total Damage (USD, adjusted)",
            Column::Cpi => "CPI",
        }
    }

    /// Match a raw header (surrounding whitespace ignored) against the known schema.
    pub fn from_header(name: &str) -> Option<Column> {
        HEADER_LOOKUP.get(name.trim()).copied()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Categorical columns usable as a grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Country")]
    Country,
    #[serde(rename = "ISO")]
    Iso,
    #[serde(rename = "Disaster Group")]
    DisasterGroup,
    #[serde(rename = "Disaster Subgroup")]
    DisasterSubgroup,
    #[serde(rename = "Disaster Type")]
    DisasterType,
    #[serde(rename = "Disaster Subtype")]
    DisasterSubtype,
}

impl Category {
    pub fn column(self) -> Column {
        match self {
            Category::Country => Column::Country,
            Category::Iso => Column::Iso,
            Category::DisasterGroup => Column::DisasterGroup,
            Category::DisasterSubgroup => Column::DisasterSubgroup,
            Category::DisasterType => Column::DisasterType,
            Category::DisasterSubtype => Column::DisasterSubtype,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column().header())
    }
}

/// Numeric columns that can be summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "Total Events")]
    TotalEvents,
    #[serde(rename = "Total Affected")]
    TotalAffected,
    #[serde(rename = "Total Deaths")]
    TotalDeaths,
    #[serde(rename = "Total Damage (USD, original)")]
    TotalDamageOriginal,
    #[serde(rename = "Total Damage (USD, adjusted)")]
    TotalDamageAdjusted,
    #[serde(rename = "CPI")]
    Cpi,
}

impl Metric {
    pub fn column(self) -> Column {
        match self {
            Metric::TotalEvents => Column::TotalEvents,
            Metric::TotalAffected => Column::TotalAffected,
            Metric::TotalDeaths => Column::TotalDeaths,
            Metric::TotalDamageOriginal => Column::TotalDamageOriginal,
            Metric::TotalDamageAdjusted => Column::TotalDamageAdjusted,
            Metric::Cpi => Column::Cpi,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column().header())
    }
}

/// One uncleaned row as it came out of the source table. Cells are kept as
/// text so CSV and spreadsheet input share a single cleaning pass.
#[derive(Debug, Default, Clone)]
pub struct RawRow {
    pub year: Option<String>,
    pub country: Option<String>,
    pub iso: Option<String>,
    pub disaster_group: Option<String>,
    pub disaster_subgroup: Option<String>,
    pub disaster_type: Option<String>,
    pub disaster_subtype: Option<String>,
    pub total_events: Option<String>,
    pub total_affected: Option<String>,
    pub total_deaths: Option<String>,
    pub total_damage_original: Option<String>,
    pub total_damage_adjusted: Option<String>,
    pub cpi: Option<String>,
}

impl RawRow {
    /// Build a row by asking `cell` for the text of each known column.
    pub fn from_cells<F>(mut cell: F) -> Self
    where
        F: FnMut(Column) -> Option<String>,
    {
        RawRow {
            year: cell(Column::Year),
            country: cell(Column::Country),
            iso: cell(Column::Iso),
            disaster_group: cell(Column::DisasterGroup),
            disaster_subgroup: cell(Column::DisasterSubgroup),
            disaster_type: cell(Column::DisasterType),
            disaster_subtype: cell(Column::DisasterSubtype),
            total_events: cell(Column::TotalEvents),
            total_affected: cell(Column::TotalAffected),
            total_deaths: cell(Column::TotalDeaths),
            total_damage_original: cell(Column::TotalDamageOriginal),
            total_damage_adjusted: cell(Column::TotalDamageAdjusted),
            cpi: cell(Column::Cpi),
        }
    }
}

/// A cleaned disaster record. Numeric impact fields are `None` when the
/// source value was blank or failed coercion; they are never defaulted to zero.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DisasterRecord {
    pub year: i32,
    pub country: String,
    pub iso: String,
    pub disaster_group: Option<String>,
    pub disaster_subgroup: Option<String>,
    pub disaster_type: String,
    pub disaster_subtype: Option<String>,
    pub total_events: u64,
    pub total_affected: Option<f64>,
    pub total_deaths: Option<f64>,
    pub total_damage_original: Option<f64>,
    pub total_damage_adjusted: Option<f64>,
    pub cpi: Option<f64>,
}

impl DisasterRecord {
    pub fn category(&self, category: Category) -> Option<&str> {
        match category {
            Category::Country => Some(self.country.as_str()),
            Category::Iso => Some(self.iso.as_str()),
            Category::DisasterGroup => self.disaster_group.as_deref(),
            Category::DisasterSubgroup => self.disaster_subgroup.as_deref(),
            Category::DisasterType => Some(self.disaster_type.as_str()),
            Category::DisasterSubtype => self.disaster_subtype.as_deref(),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TotalEvents => Some(self.total_events as f64),
            Metric::TotalAffected => self.total_affected,
            Metric::TotalDeaths => self.total_deaths,
            Metric::TotalDamageOriginal => self.total_damage_original,
            Metric::TotalDamageAdjusted => self.total_damage_adjusted,
            Metric::Cpi => self.cpi,
        }
    }
}

/// Sum of one grouping key, e.g. events per disaster type.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CategorySum {
    #[tabled(rename = "Label")]
    pub label: String,
    #[tabled(rename = "Total", display_with = "display_amount")]
    pub total: f64,
    #[tabled(rename = "Missing")]
    pub missing: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearSum {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Total", display_with = "display_amount")]
    pub total: f64,
    #[tabled(rename = "Missing")]
    pub missing: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct YearCategorySum {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Group")]
    pub label: String,
    #[tabled(rename = "Total", display_with = "display_amount")]
    pub total: f64,
    #[tabled(rename = "Missing")]
    pub missing: usize,
}

/// Parent/child pair of a two-level breakdown (sunburst slice).
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct HierarchySum {
    #[tabled(rename = "Parent")]
    pub parent: String,
    #[tabled(rename = "Child")]
    pub child: String,
    #[tabled(rename = "Total", display_with = "display_amount")]
    pub total: f64,
    #[tabled(rename = "Missing")]
    pub missing: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CountrySummaryRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Total Events")]
    #[tabled(rename = "Total Events")]
    pub total_events: u64,
    #[serde(rename = "Total Affected")]
    #[tabled(rename = "Total Affected", display_with = "display_amount")]
    pub total_affected: f64,
    #[serde(rename = "Total Deaths")]
    #[tabled(rename = "Total Deaths", display_with = "display_amount")]
    pub total_deaths: f64,
    #[serde(rename = "Total Damage (USD, original)")]
    #[tabled(rename = "Total Damage (USD)", display_with = "display_amount")]
    pub total_damage: f64,
    /// Rows contributing at least one null impact value.
    #[serde(rename = "Incomplete Rows")]
    #[tabled(rename = "Incomplete Rows")]
    pub incomplete_rows: usize,
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct RecentEventRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "Disaster Type")]
    #[tabled(rename = "Disaster Type")]
    pub disaster_type: String,
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Total Events")]
    #[tabled(rename = "Total Events")]
    pub total_events: u64,
    #[serde(rename = "Total Affected")]
    #[tabled(rename = "Total Affected", display_with = "display_opt_amount")]
    pub total_affected: Option<f64>,
}

/// Events per ISO code, labelled with a country name for map tooltips.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct GeoSum {
    #[tabled(rename = "ISO")]
    pub iso: String,
    #[tabled(rename = "Country")]
    pub country: String,
    #[tabled(rename = "Total Events")]
    pub total_events: u64,
}
