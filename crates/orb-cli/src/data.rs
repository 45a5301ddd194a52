//! Minimal CSV bar loader (§6.1: data acquisition is an external
//! collaborator the core never implements, but the CLI needs *some* way
//! to turn files on disk into `&[Bar]`). Format: one header row
//! (`timestamp,open,high,low,close,volume`) then one row per bar, RFC3339
//! timestamps. The `csv` crate isn't part of the teacher's own stack but
//! is carried by `barter-strategy` in the retrieval pack for exactly this
//! concern (see DESIGN.md).

use chrono::{DateTime, NaiveDate, Utc};
use orb_types::{Bar, DataError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Read, validate, and date-filter one instrument's bars from
/// `<data_dir>/<symbol>.csv`.
///
/// Validation enforces §3.1's OHLC invariant and the §5 ordering
/// guarantee (strictly non-decreasing timestamps); either violation is a
/// [`DataError`], mapped by the CLI to exit code 2. An instrument with no
/// rows surviving the `[start, end]` filter is also a `DataError`
/// (§7: "empty session").
pub fn load_instrument_bars(
    data_dir: &str,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Bar>, DataError> {
    let path = format!("{data_dir}/{symbol}.csv");
    let mut reader = csv::Reader::from_path(&path).map_err(|e| DataError::MalformedBar {
        instrument: symbol.to_string(),
        index: 0,
        reason: format!("open {path}: {e}"),
    })?;

    let mut bars = Vec::new();
    let mut last_timestamp: Option<DateTime<Utc>> = None;

    for (index, result) in reader.deserialize::<BarRow>().enumerate() {
        let row = result.map_err(|e| DataError::MalformedBar {
            instrument: symbol.to_string(),
            index,
            reason: e.to_string(),
        })?;

        let bar = Bar::new(row.timestamp, row.open, row.high, row.low, row.close, row.volume);
        if !bar.is_well_formed() {
            return Err(DataError::MalformedBar {
                instrument: symbol.to_string(),
                index,
                reason: "OHLC/volume invariant violated".to_string(),
            });
        }
        if let Some(prev) = last_timestamp {
            if bar.timestamp < prev {
                return Err(DataError::NonMonotonicTimestamp {
                    instrument: symbol.to_string(),
                    index,
                });
            }
        }
        last_timestamp = Some(bar.timestamp);

        let local_date = bar.timestamp.date_naive();
        if local_date >= start && local_date <= end {
            bars.push(bar);
        }
    }

    if bars.is_empty() {
        return Err(DataError::NoData {
            instrument: symbol.to_string(),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(symbol: &str, contents: &str) -> String {
        let dir = std::env::temp_dir().join(format!("orb-cli-data-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{symbol}.csv"));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        dir.to_string_lossy().into_owned()
    }

    #[test]
    fn loads_well_formed_rows_in_range() {
        let dir = write_csv(
            "ES",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T14:30:00Z,100.0,100.5,99.8,100.2,1000\n\
             2024-01-02T14:31:00Z,100.2,100.7,100.0,100.5,900\n",
        );
        let bars = load_instrument_bars(
            &dir,
            "ES",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn rejects_malformed_ohlc() {
        let dir = write_csv(
            "NQ",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T14:30:00Z,100.0,99.0,99.8,100.2,1000\n",
        );
        let err = load_instrument_bars(
            &dir,
            "NQ",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::MalformedBar { .. }));
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let dir = write_csv(
            "CL",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T14:31:00Z,100.0,100.5,99.8,100.2,1000\n\
             2024-01-02T14:30:00Z,100.2,100.7,100.0,100.5,900\n",
        );
        let err = load_instrument_bars(
            &dir,
            "CL",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::NonMonotonicTimestamp { .. }));
    }

    #[test]
    fn empty_date_range_is_no_data() {
        let dir = write_csv(
            "GC",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T14:30:00Z,100.0,100.5,99.8,100.2,1000\n",
        );
        let err = load_instrument_bars(
            &dir,
            "GC",
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::NoData { .. }));
    }
}
