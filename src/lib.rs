// Filter-and-aggregate engine behind the natural-disaster dashboard.
//
// A `RecordStore` is loaded once from an EM-DAT export. Each query is a
// `Constraints` set; the `ViewAssembler` filters the store once and
// derives every dashboard view from that single `FilteredView`.
pub mod aggregate;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod store;
pub mod types;
pub mod util;
pub mod view;

pub use config::DashboardConfig;
pub use error::{DashboardError, DataLoadError, SchemaError};
pub use filter::{filter, Constraints, FilteredView, Predicate, Selection};
pub use store::{RecordStore, Schema};
pub use view::{DashboardBundle, ViewAssembler};
