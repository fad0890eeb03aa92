//! CSV → typed measurement records.
//!
//! Columns are located by header name once, up front; every row is then
//! converted into a [`MeasurementRecord`] or the whole file is rejected.

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{MeasurementRecord, ParseError};

pub const COL_NAME: &str = "Equipment Name";
pub const COL_TYPE: &str = "Type";
pub const COL_FLOWRATE: &str = "Flowrate";
pub const COL_PRESSURE: &str = "Pressure";
pub const COL_TEMPERATURE: &str = "Temperature";

pub const REQUIRED_COLUMNS: [&str; 5] = [COL_NAME, COL_TYPE, COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE];

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    name: usize,
    eq_type: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl ColumnMap {
    fn locate(headers: &StringRecord) -> Result<Self, ParseError> {
        let position = |column: &str| -> Option<usize> {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        };

        let found: Vec<Option<usize>> = REQUIRED_COLUMNS.iter().map(|c| position(*c)).collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(&found)
            .filter(|(_, idx)| idx.is_none())
            .map(|(c, _)| c.to_string())
            .collect();

        match *found.as_slice() {
            [Some(name), Some(eq_type), Some(flowrate), Some(pressure), Some(temperature)] => Ok(Self {
                name,
                eq_type,
                flowrate,
                pressure,
                temperature,
            }),
            _ => Err(ParseError::Schema { missing }),
        }
    }
}

/// Parses an uploaded CSV file. Records come back in file order.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<MeasurementRecord>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            return Err(ParseError::Row {
                row: 0,
                column: None,
                reason: format!("unreadable header: {e}"),
            })
        }
    };
    let columns = ColumnMap::locate(&headers)?;

    let mut out = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result.map_err(|e| ParseError::Row {
            row,
            column: None,
            reason: format!("malformed CSV: {e}"),
        })?;

        // the csv reader already drops blank lines; this catches "  " lines after trimming.
        // A row of empty fields such as ",,,," is not blank and fails below.
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }

        out.push(MeasurementRecord {
            name: text_cell(&record, columns.name, COL_NAME, row)?,
            eq_type: text_cell(&record, columns.eq_type, COL_TYPE, row)?,
            flowrate: number_cell(&record, columns.flowrate, COL_FLOWRATE, row)?,
            pressure: number_cell(&record, columns.pressure, COL_PRESSURE, row)?,
            temperature: number_cell(&record, columns.temperature, COL_TEMPERATURE, row)?,
        });
    }

    Ok(out)
}

fn row_error(row: usize, column: &str, reason: String) -> ParseError {
    ParseError::Row {
        row,
        column: Some(column.to_string()),
        reason,
    }
}

fn cell<'r>(record: &'r StringRecord, idx: usize, column: &str, row: usize) -> Result<&'r str, ParseError> {
    match record.get(idx) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(row_error(row, column, format!("missing value for '{column}'"))),
    }
}

fn text_cell(record: &StringRecord, idx: usize, column: &str, row: usize) -> Result<String, ParseError> {
    cell(record, idx, column, row).map(str::to_string)
}

fn number_cell(record: &StringRecord, idx: usize, column: &str, row: usize) -> Result<f64, ParseError> {
    let raw = cell(record, idx, column, row)?;
    let value: f64 = raw
        .parse()
        .map_err(|_| row_error(row, column, format!("'{raw}' in '{column}' is not a number")))?;

    if !value.is_finite() {
        return Err(row_error(row, column, format!("'{raw}' in '{column}' is not a finite number")));
    }
    Ok(value)
}
