use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use rust_xlsxwriter::Workbook;

use crate::types::{OUTPUT_COLUMNS, OwnerRow, RawRecordRow};
use crate::utils::RecordTypeFilter;

pub const ADDRESS: &str = "Address";
pub const RECORD_NUMBER: &str = "Record Number";
pub const RECORD_TYPE: &str = "Record Type";
pub const DESCRIPTION: &str = "Description";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

/// A CSV table that keeps every column it was read with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .inspect_err(|e| log::error!("Failed to open {}: {e}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<(), DatasetError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row given as `(column, value)` pairs; unknown columns are added.
    pub fn push_row(&mut self, values: &[(&str, &str)]) {
        for (column, _) in values {
            if self.column(column).is_none() {
                self.add_column(column);
            }
        }
        let mut row = vec![String::new(); self.headers.len()];
        for (column, value) in values {
            if let Some(i) = self.column(column) {
                row[i] = value.to_string();
            }
        }
        self.rows.push(row);
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize, DatasetError> {
        self.column(name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    fn add_column(&mut self, name: &str) {
        self.headers.push(name.to_string());
        for row in self.rows.iter_mut() {
            row.push(String::new());
        }
    }

    /// Stacks `other` under `self`, aligning columns by name.
    pub fn concat(mut self, other: Table) -> Table {
        for header in &other.headers {
            if self.column(header).is_none() {
                self.add_column(header);
            }
        }
        let positions: Vec<usize> = other
            .headers
            .iter()
            .filter_map(|h| self.column(h))
            .collect();

        for row in other.rows {
            let mut aligned = vec![String::new(); self.headers.len()];
            for (value, &i) in row.into_iter().zip(&positions) {
                aligned[i] = value;
            }
            self.rows.push(aligned);
        }
        self
    }

    pub fn retain_types(&mut self, filter: &RecordTypeFilter) -> Result<(), DatasetError> {
        let column = self.require(RECORD_TYPE)?;
        self.rows.retain(|row| filter.allows(&row[column]));
        Ok(())
    }

    /// Keeps the first row for each combination of `keys`. Returns how many were dropped.
    pub fn dedup_by(&mut self, keys: &[&str]) -> Result<usize, DatasetError> {
        let columns = keys
            .iter()
            .map(|k| self.require(k))
            .collect::<Result<Vec<_>, _>>()?;

        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key: Vec<String> = columns.iter().map(|&i| row[i].clone()).collect();
            seen.insert(key)
        });
        Ok(before - self.rows.len())
    }

    pub fn records(&self) -> Result<Vec<RawRecordRow>, DatasetError> {
        let address = self.require(ADDRESS)?;
        let record_number = self.require(RECORD_NUMBER)?;
        let record_type = self.require(RECORD_TYPE)?;
        let description = self.column(DESCRIPTION);

        Ok(self
            .rows
            .iter()
            .map(|row| RawRecordRow {
                address: row[address].clone(),
                record_number: row[record_number].clone(),
                record_type: row[record_type].clone(),
                description: description.map(|i| row[i].clone()).unwrap_or_default(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No canonical dataset existed; the export became it.
    Created { rows: usize },
    Merged { rows: usize },
}

/// Folds a freshly exported file into the canonical dataset.
///
/// The export is consumed either way: renamed into place when there is no
/// canonical dataset yet, otherwise appended, filtered and deleted.
/// Duplicates are left in; [`prepare_records`] removes them once.
pub fn merge_export(
    export_path: &Path,
    canonical_path: &Path,
    filter: Option<&RecordTypeFilter>,
) -> Result<MergeOutcome, DatasetError> {
    if !canonical_path.exists() {
        log::info!("Creating new data file: {}", canonical_path.display());
        let rows = Table::read(export_path)?.len();
        move_file(export_path, canonical_path)?;
        return Ok(MergeOutcome::Created { rows });
    }

    log::info!(
        "Merging {} into {}",
        export_path.display(),
        canonical_path.display()
    );
    let existing = Table::read(canonical_path)?;
    let fresh = Table::read(export_path)?;
    let mut combined = existing.concat(fresh);

    if let Some(filter) = filter {
        combined.retain_types(filter)?;
    }

    combined.write(canonical_path)?;
    fs::remove_file(export_path)?;
    Ok(MergeOutcome::Merged {
        rows: combined.len(),
    })
}

/// Reads the canonical dataset for enrichment: filtered, deduplicated on
/// `(Address, Record Number)`.
pub fn prepare_records(
    canonical_path: &Path,
    filter: Option<&RecordTypeFilter>,
) -> Result<Vec<RawRecordRow>, DatasetError> {
    let mut table = Table::read(canonical_path)?;
    if let Some(filter) = filter {
        table.retain_types(filter)?;
    }
    let dropped = table.dedup_by(&[ADDRESS, RECORD_NUMBER])?;
    log::info!(
        "{} record(s) after filtering, {} duplicate(s) dropped",
        table.len(),
        dropped
    );
    table.records()
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Different filesystems
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Shifts the last run's files aside before a new output is written.
///
/// The previous-output slot is cleared, an existing output moves into it, and
/// when that happens the canonical dataset moves to the processed slot.
pub fn rotate_outputs(
    output: &Path,
    previous_output: &Path,
    canonical: &Path,
    processed: &Path,
) -> io::Result<()> {
    if previous_output.exists() {
        fs::remove_file(previous_output)?;
        log::info!("File {} has been deleted", previous_output.display());
    }

    if output.exists() {
        move_file(output, previous_output)?;
        log::info!("File renamed to {}", previous_output.display());

        if canonical.exists() {
            if processed.exists() {
                fs::remove_file(processed)?;
                log::info!("File {} has been deleted", processed.display());
            }
            move_file(canonical, processed)?;
        }
    }
    Ok(())
}

pub fn write_rows_csv(rows: &[OwnerRow], path: &Path) -> Result<(), DatasetError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(OUTPUT_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_rows_json(rows: &[OwnerRow], path: &Path) -> Result<(), DatasetError> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), rows)?;
    Ok(())
}

/// One worksheet: the header row, then one row per owner, all as text.
pub fn write_rows_xlsx(rows: &[OwnerRow], path: &Path) -> Result<(), DatasetError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in (0u16..).zip(OUTPUT_COLUMNS) {
        worksheet.write_string(0, col, header)?;
    }
    for (row, owner) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(owner.values()) {
            worksheet.write_string(row, col, value)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Date,Record Number,Record Type,Address,Description,Status
01/02/2024,R-1,Rental Registration,\"123 3RD ST, Columbus OH 43215\",New rental,Issued
01/03/2024,R-2,Sign Permit,\"9 MAIN ST, Columbus OH 43215\",Sign,Issued
01/04/2024,R-3,Rental Registration,\"44 HIGH ST, Columbus OH 43215\",Renewal,Open
";

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_first_export_becomes_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("RecordList1.csv");
        let canonical = dir.path().join("DataFile.csv");
        write(&export, EXPORT);

        let outcome = merge_export(&export, &canonical, None).unwrap();
        assert_eq!(outcome, MergeOutcome::Created { rows: 3 });
        assert!(!export.exists(), "export is consumed");
        assert_eq!(Table::read(&canonical).unwrap().len(), 3);
    }

    #[test]
    fn test_merge_appends_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("RecordList1.csv");
        let canonical = dir.path().join("DataFile.csv");
        write(&canonical, EXPORT);
        write(&export, EXPORT);

        let filter = RecordTypeFilter::new(["Rental Registration"]);
        let outcome = merge_export(&export, &canonical, Some(&filter)).unwrap();

        assert_eq!(outcome, MergeOutcome::Merged { rows: 4 });
        assert!(!export.exists());
        let table = Table::read(&canonical).unwrap();
        let types = table.column(RECORD_TYPE).unwrap();
        assert!(table.rows().iter().all(|r| r[types] == "Rental Registration"));
        assert_eq!(table.headers().len(), 6, "extra columns survive");
    }

    #[test]
    fn test_double_merge_then_dedup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("DataFile.csv");

        let once = dir.path().join("once.csv");
        let export = dir.path().join("RecordList1.csv");
        write(&export, EXPORT);
        merge_export(&export, &once, None).unwrap();
        let expected = prepare_records(&once, None).unwrap().len();

        for _ in 0..2 {
            write(&export, EXPORT);
            merge_export(&export, &canonical, None).unwrap();
        }
        assert_eq!(Table::read(&canonical).unwrap().len(), 6);
        assert_eq!(prepare_records(&canonical, None).unwrap().len(), expected);
    }

    #[test]
    fn test_concat_aligns_columns() {
        let mut left = Table::new(vec!["A".into(), "B".into()]);
        left.push_row(&[("A", "1"), ("B", "2")]);
        let mut right = Table::new(vec!["B".into(), "C".into()]);
        right.push_row(&[("B", "3"), ("C", "4")]);

        let combined = left.concat(right);
        assert_eq!(combined.headers(), &["A", "B", "C"]);
        assert_eq!(combined.rows()[0], vec!["1", "2", ""]);
        assert_eq!(combined.rows()[1], vec!["", "3", "4"]);
    }

    #[test]
    fn test_records_require_columns() {
        let mut table = Table::new(vec![ADDRESS.into()]);
        table.push_row(&[(ADDRESS, "1 A ST")]);
        assert!(matches!(
            table.records(),
            Err(DatasetError::MissingColumn(c)) if c == RECORD_NUMBER
        ));
    }

    #[test]
    fn test_rotate_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        write(&p("Output.csv"), "new-ish");
        write(&p("Previous_output.csv"), "stale");
        write(&p("DataFile.csv"), "data");
        write(&p("ProcessedRecords.csv"), "old data");

        rotate_outputs(
            &p("Output.csv"),
            &p("Previous_output.csv"),
            &p("DataFile.csv"),
            &p("ProcessedRecords.csv"),
        )
        .unwrap();

        assert!(!p("Output.csv").exists());
        assert_eq!(fs::read_to_string(p("Previous_output.csv")).unwrap(), "new-ish");
        assert!(!p("DataFile.csv").exists());
        assert_eq!(fs::read_to_string(p("ProcessedRecords.csv")).unwrap(), "data");
    }

    #[test]
    fn test_rotate_without_output_keeps_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        write(&p("DataFile.csv"), "data");

        rotate_outputs(
            &p("Output.csv"),
            &p("Previous_output.csv"),
            &p("DataFile.csv"),
            &p("ProcessedRecords.csv"),
        )
        .unwrap();
        assert!(p("DataFile.csv").exists());
        assert!(!p("ProcessedRecords.csv").exists());
    }

    #[test]
    fn test_write_rows_csv_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Output.csv");
        let row = OwnerRow {
            record_number: "R-1".into(),
            full_name: "Jane Doe".into(),
            ..Default::default()
        };
        write_rows_csv(&[row], &path).unwrap();

        let table = Table::read(&path).unwrap();
        assert_eq!(table.headers().len(), 31);
        assert_eq!(table.headers()[4], "full name");
        assert_eq!(table.rows()[0][0], "R-1");
        assert_eq!(table.rows()[0][4], "Jane Doe");
    }

    #[test]
    fn test_write_rows_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Output.xlsx");
        let row = OwnerRow {
            record_number: "R-1".into(),
            full_name: "Jane Doe".into(),
            transfer_price: "$120,000".into(),
            ..Default::default()
        };
        write_rows_xlsx(&[row.clone(), row], &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");
    }

    #[test]
    fn test_row_values_follow_header() {
        let row = OwnerRow {
            record_number: "R-1".into(),
            full_name: "Jane Doe".into(),
            tot_fin_area: "1200".into(),
            transfer_price: "$120,000".into(),
            ..Default::default()
        };
        let values = row.values();
        let at = |name: &str| values[OUTPUT_COLUMNS.iter().position(|c| *c == name).unwrap()];
        assert_eq!(at("record_number"), "R-1");
        assert_eq!(at("full name"), "Jane Doe");
        assert_eq!(at("Tot Fin Area"), "1200");
        assert_eq!(at("Transfer Price"), "$120,000");
    }
}
