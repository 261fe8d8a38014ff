//! Training data sources
//!
//! A `DataStore` trait over labeled rows, an in-memory implementation,
//! CSV import through polars and a seeded sample dataset.

mod csv;
mod sample;
mod store;

pub use csv::{load_csv, REQUIRED_COLUMNS};
pub use sample::sample_records;
pub use store::{DataStore, InMemoryDataStore};
