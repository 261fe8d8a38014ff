//! Source of labeled training rows

use crate::error::Result;
use crate::preprocessing::RawRecord;
use parking_lot::RwLock;

/// Read access to stored mortality rows.
///
/// A row is labeled when both `deaths` and `population` are present. Row
/// order is unspecified.
pub trait DataStore: Send + Sync {
    fn count_labeled(&self) -> Result<usize>;

    /// At most `limit` labeled rows
    fn load_labeled(&self, limit: usize) -> Result<Vec<RawRecord>>;
}

fn is_labeled(record: &RawRecord) -> bool {
    record.deaths.is_some() && record.population.is_some()
}

/// Rows held in memory
#[derive(Default)]
pub struct InMemoryDataStore {
    rows: RwLock<Vec<RawRecord>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RawRecord>) -> Self {
        Self {
            rows: RwLock::new(records),
        }
    }

    /// Append rows and return the new total
    pub fn extend(&self, records: impl IntoIterator<Item = RawRecord>) -> usize {
        let mut rows = self.rows.write();
        rows.extend(records);
        rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl DataStore for InMemoryDataStore {
    fn count_labeled(&self) -> Result<usize> {
        Ok(self.rows.read().iter().filter(|r| is_labeled(r)).count())
    }

    fn load_labeled(&self, limit: usize) -> Result<Vec<RawRecord>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|r| is_labeled(r))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(deaths: Option<i64>, population: Option<i64>) -> RawRecord {
        RawRecord {
            deaths,
            population,
            ..Default::default()
        }
    }

    #[test]
    fn test_unlabeled_rows_are_excluded() {
        let store = InMemoryDataStore::with_records(vec![
            row(Some(1), Some(100)),
            row(None, Some(100)),
            row(Some(3), None),
            row(Some(4), Some(400)),
        ]);

        assert_eq!(store.len(), 4);
        assert_eq!(store.count_labeled().unwrap(), 2);
        assert_eq!(store.load_labeled(10).unwrap().len(), 2);
        assert_eq!(store.load_labeled(1).unwrap().len(), 1);
    }

    #[test]
    fn test_extend() {
        let store = InMemoryDataStore::new();
        assert!(store.is_empty());
        assert_eq!(store.extend(vec![row(Some(1), Some(1)); 3]), 3);
        assert_eq!(store.count_labeled().unwrap(), 3);
    }
}
