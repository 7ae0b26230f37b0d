//! The case table: CSV rows plus the typed records parsed from them.
//!
//! The raw cells are kept so every input column passes through to the
//! output untouched; enrichment stages only append (or replace) columns.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use case_enrich_case_models::CaseRecord;

use crate::PipelineError;
use crate::columns::{self, is_missing};

/// A loaded case table.
#[derive(Debug, Clone)]
pub struct CaseTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    records: Vec<CaseRecord>,
}

/// Header positions of the columns records are parsed from.
struct ColumnIndex {
    case_number: usize,
    latitude: Option<usize>,
    longitude: Option<usize>,
    incident_street: Option<usize>,
    incident_city: Option<usize>,
    incident_zip: Option<usize>,
    residence_city: Option<usize>,
    death_street: Option<usize>,
    death_city: Option<usize>,
    death_state: Option<usize>,
    death_zip: Option<usize>,
    primary_cause: Option<usize>,
    secondary: Vec<usize>,
}

impl ColumnIndex {
    fn new(headers: &[String]) -> Result<Self, PipelineError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        Ok(Self {
            case_number: find(columns::CASE_NUMBER).ok_or(PipelineError::MissingColumn {
                column: columns::CASE_NUMBER,
            })?,
            latitude: find(columns::LATITUDE),
            longitude: find(columns::LONGITUDE),
            incident_street: find(columns::INCIDENT_STREET),
            incident_city: find(columns::INCIDENT_CITY),
            incident_zip: find(columns::INCIDENT_ZIP),
            residence_city: find(columns::RESIDENCE_CITY),
            death_street: find(columns::DEATH_STREET),
            death_city: find(columns::DEATH_CITY),
            death_state: find(columns::DEATH_STATE),
            death_zip: find(columns::DEATH_ZIP),
            primary_cause: find(columns::PRIMARY_CAUSE),
            secondary: headers
                .iter()
                .enumerate()
                .filter(|(_, h)| {
                    h.starts_with(columns::SECONDARY_PREFIX)
                        && h.as_str() != columns::SECONDARY_COMBINED
                })
                .map(|(i, _)| i)
                .collect(),
        })
    }

    fn record(&self, row: &[String], line: usize) -> Result<CaseRecord, PipelineError> {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .filter(|value| !is_missing(value))
                .cloned()
        };

        let case_number = cell(Some(self.case_number))
            .map(|id| id.trim().to_string())
            .ok_or(PipelineError::MissingCaseNumber { line })?;

        let latitude = parse_coordinate(cell(self.latitude), columns::LATITUDE, &case_number);
        let longitude = parse_coordinate(cell(self.longitude), columns::LONGITUDE, &case_number);

        Ok(CaseRecord {
            latitude,
            longitude,
            incident_street: cell(self.incident_street),
            incident_city: cell(self.incident_city),
            incident_zip: cell(self.incident_zip),
            residence_city: cell(self.residence_city),
            death_street: cell(self.death_street),
            death_city: cell(self.death_city),
            death_state: cell(self.death_state),
            death_zip: cell(self.death_zip),
            primary_cause: cell(self.primary_cause),
            secondary_causes: self.secondary.iter().map(|i| cell(Some(*i))).collect(),
            case_number,
        })
    }
}

/// Parses a coordinate cell. Non-numeric values are treated as absent.
fn parse_coordinate(value: Option<String>, column: &str, case_number: &str) -> Option<f64> {
    let value = value?;
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            log::warn!("Case {case_number}: ignoring non-numeric {column} '{value}'");
            None
        }
    }
}

impl CaseTable {
    /// Reads a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Csv`] if the file cannot be opened or parsed
    /// * [`PipelineError::MissingColumn`] if there is no `casenumber` column
    /// * [`PipelineError::MissingCaseNumber`] if a row has no case number
    /// * [`PipelineError::DuplicateCase`] if a case number repeats
    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let reader = csv::Reader::from_path(path)?;
        let table = Self::from_csv(reader)?;
        log::info!("Loaded {} cases from {}", table.len(), path.display());
        Ok(table)
    }

    /// Reads CSV from any reader. See [`CaseTable::read`].
    ///
    /// # Errors
    ///
    /// Same as [`CaseTable::read`].
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, PipelineError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, PipelineError> {
        let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();
        let index = ColumnIndex::new(&headers)?;

        let mut rows = Vec::new();
        let mut records = Vec::new();
        let mut seen = BTreeSet::new();

        for (i, row) in reader.records().enumerate() {
            let row: Vec<String> = row?.iter().map(ToString::to_string).collect();
            // Header is line 1.
            let record = index.record(&row, i + 2)?;
            if !seen.insert(record.case_number.clone()) {
                return Err(PipelineError::DuplicateCase {
                    case_number: record.case_number,
                });
            }
            rows.push(row);
            records.push(record);
        }

        Ok(Self {
            headers,
            rows,
            records,
        })
    }

    #[must_use]
    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The raw cell at `row` in column `name`, if both exist.
    #[must_use]
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == name)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Sets a column, one value per row. An existing column with the same
    /// name is replaced in place; otherwise the column is appended.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::ColumnLength`] if `values` does not have one entry
    ///   per row
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), PipelineError> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        match self.headers.iter().position(|h| h == name) {
            Some(col) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }

        Ok(())
    }

    /// Writes the table as CSV to `path`.
    ///
    /// The data goes to a hidden sibling file first and is renamed over
    /// `path` only once fully written, so a failed run never leaves a
    /// truncated output behind.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if writing or renaming fails.
    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        let tmp = temp_sibling(path);

        let result = csv::Writer::from_path(&tmp)
            .map_err(PipelineError::from)
            .and_then(|writer| self.write_csv(writer))
            .and_then(|()| std::fs::rename(&tmp, path).map_err(PipelineError::from));

        if result.is_err() {
            std::fs::remove_file(&tmp).ok();
        } else {
            log::info!("Wrote {} cases to {}", self.len(), path.display());
        }
        result
    }

    fn write_csv<W: io::Write>(&self, mut writer: csv::Writer<W>) -> Result<(), PipelineError> {
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}
