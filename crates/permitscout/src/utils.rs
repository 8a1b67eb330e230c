use std::collections::HashSet;
use std::path::Path;

use crate::dataset::{DatasetError, Table};

pub const FILTER_COLUMN: &str = "record type";

/// The record types worth enriching, read from a one-column CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTypeFilter {
    allowed: HashSet<String>,
}

impl RecordTypeFilter {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: types.into_iter().map(Into::into).collect(),
        }
    }

    /// `Ok(None)` when there is no filter file, meaning "keep everything".
    pub fn load(path: &Path) -> Result<Option<Self>, DatasetError> {
        if !path.exists() {
            log::warn!("Filter file {} not found, skipping filtering", path.display());
            return Ok(None);
        }
        let table = Table::read(path)?;
        let column = table
            .headers()
            .iter()
            .position(|h| h.eq_ignore_ascii_case(FILTER_COLUMN))
            .ok_or_else(|| DatasetError::MissingColumn(FILTER_COLUMN.to_string()))?;

        let filter = Self::new(
            table
                .rows()
                .iter()
                .filter_map(|row| row.get(column))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        );
        log::info!(
            "Loaded {} allowed record type(s) from {}",
            filter.len(),
            path.display()
        );
        Ok(Some(filter))
    }

    pub fn allows(&self, record_type: &str) -> bool {
        self.allowed.contains(record_type.trim())
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Which slice of the deduplicated records to enrich.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordWindow {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl RecordWindow {
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let mut items: Vec<T> = items.into_iter().skip(self.offset.unwrap_or(0)).collect();
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        items
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub intervals_planned: usize,
    pub intervals_merged: usize,
    pub intervals_empty: usize,
    pub intervals_abandoned: usize,
    pub records_found: usize,
    pub records_not_found: usize,
    pub records_skipped: usize,
    pub records_failed: usize,
    pub rows_written: usize,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        if self.intervals_planned > 0 {
            writeln!(f, "  Intervals planned:        {}", self.intervals_planned)?;
            writeln!(f, "  Intervals merged:         {}", self.intervals_merged)?;
            writeln!(f, "  Intervals with no rows:   {}", self.intervals_empty)?;
            writeln!(f, "  Intervals abandoned:      {}", self.intervals_abandoned)?;
        }
        writeln!(f, "  Records enriched:         {}", self.records_found)?;
        writeln!(f, "  Records not on auditor:   {}", self.records_not_found)?;
        writeln!(f, "  Records skipped:          {}", self.records_skipped)?;
        writeln!(f, "  Records failed:           {}", self.records_failed)?;
        writeln!(f, "  Rows written:             {}", self.rows_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record_types.csv");
        fs::write(
            &path,
            "record type\nRental Registration\n Building Permit \n\n",
        )
        .unwrap();

        let filter = RecordTypeFilter::load(&path).unwrap().expect("file exists");
        assert_eq!(filter.len(), 2);
        assert!(filter.allows("Rental Registration"));
        assert!(filter.allows("Building Permit"));
        assert!(!filter.allows("Sign Permit"));
    }

    #[test]
    fn test_missing_filter_file_means_no_filter() {
        let dir = tempfile::tempdir().unwrap();
        let filter = RecordTypeFilter::load(&dir.path().join("absent.csv")).unwrap();
        assert!(filter.is_none());
    }

    #[test]
    fn test_filter_without_column_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record_types.csv");
        fs::write(&path, "type\nA\n").unwrap();
        assert!(matches!(
            RecordTypeFilter::load(&path),
            Err(DatasetError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_window() {
        let items: Vec<u32> = (0..10).collect();
        let window = RecordWindow {
            offset: Some(1),
            limit: Some(3),
        };
        assert_eq!(window.apply(items.clone()), vec![1, 2, 3]);
        assert_eq!(RecordWindow::default().apply(items.clone()).len(), 10);
        assert!(
            RecordWindow {
                offset: None,
                limit: Some(0)
            }
            .validate()
            .is_err()
        );
    }
}
