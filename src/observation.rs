//! Raw monthly observations and CSV ingest.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// One calendar month of region-averaged satellite observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub month: u32,
    pub ndvi: f64,
    pub precipitation_mm: f64,
    pub temp_mean_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
}

impl Observation {
    pub fn new(year: i32, month: u32, ndvi: f64, precipitation_mm: f64) -> Self {
        Self {
            year,
            month,
            ndvi,
            precipitation_mm,
            temp_mean_c: None,
            temp_max_c: None,
            temp_min_c: None,
        }
    }

    pub fn with_temperatures(
        mut self,
        mean: Option<f64>,
        max: Option<f64>,
        min: Option<f64>,
    ) -> Self {
        self.temp_mean_c = mean;
        self.temp_max_c = max;
        self.temp_min_c = min;
        self
    }

    /// Sort key; months compare within a year.
    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    pub fn date_label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    pub fn season(&self) -> Result<Season, ObservationError> {
        Season::from_month(self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Summer,
    Monsoon,
    PostMonsoon,
}

pub const ALL_SEASONS: [Season; 4] = [
    Season::Winter,
    Season::Summer,
    Season::Monsoon,
    Season::PostMonsoon,
];

impl Season {
    pub fn from_month(month: u32) -> Result<Self, ObservationError> {
        match month {
            12 | 1 | 2 => Ok(Self::Winter),
            3..=5 => Ok(Self::Summer),
            6..=9 => Ok(Self::Monsoon),
            10 | 11 => Ok(Self::PostMonsoon),
            other => Err(ObservationError::InvalidMonth(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Summer => "Summer",
            Self::Monsoon => "Monsoon",
            Self::PostMonsoon => "Post-Monsoon",
        }
    }
}

#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("observation table is missing column {0}")]
    MissingColumn(&'static str),
    #[error("line {line}: failed to parse field {field} value '{value}'")]
    ParseField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: required field {field} is empty")]
    MissingValue { line: u64, field: &'static str },
    #[error("line {line}: precipitation must be >= 0, got {value}")]
    NegativePrecipitation { line: u64, value: f64 },
    #[error("invalid calendar month: {0}")]
    InvalidMonth(u32),
}

/// Column positions resolved once from the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    year: Option<usize>,
    month: Option<usize>,
    date: Option<usize>,
    ndvi: usize,
    precipitation_mm: usize,
    temp_mean_c: Option<usize>,
    temp_max_c: Option<usize>,
    temp_min_c: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Result<Self, ObservationError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let index = Self {
            year: find("year"),
            month: find("month"),
            date: find("date"),
            ndvi: find("ndvi").ok_or(ObservationError::MissingColumn("ndvi"))?,
            precipitation_mm: find("precipitation_mm")
                .ok_or(ObservationError::MissingColumn("precipitation_mm"))?,
            temp_mean_c: find("temp_mean_c"),
            temp_max_c: find("temp_max_c"),
            temp_min_c: find("temp_min_c"),
        };

        if (index.year.is_none() || index.month.is_none()) && index.date.is_none() {
            return Err(ObservationError::MissingColumn("date"));
        }

        Ok(index)
    }
}

pub fn load_observations_csv(path: &Path) -> Result<Vec<Observation>, ObservationError> {
    let file = fs::File::open(path)?;
    let observations = read_observations(file)?;

    info!(
        component = "observation",
        event = "observation.load.finish",
        path = %path.display(),
        rows = observations.len()
    );

    Ok(observations)
}

/// Reads a headed observation table. Row order is preserved as-is.
pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, ObservationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(parse_observation_record(&record, &columns)?);
    }
    Ok(rows)
}

fn parse_observation_record(
    record: &StringRecord,
    columns: &ColumnIndex,
) -> Result<Observation, ObservationError> {
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    let (year, month) = match (columns.year, columns.month) {
        (Some(year_idx), Some(month_idx)) => (
            parse_i32(record, year_idx, "year", line)?,
            parse_u32(record, month_idx, "month", line)?,
        ),
        _ => {
            let date_idx = columns.date.ok_or(ObservationError::MissingColumn("date"))?;
            parse_year_month(record, date_idx, line)?
        }
    };
    if !(1..=12).contains(&month) {
        return Err(ObservationError::InvalidMonth(month));
    }

    let ndvi = parse_optional_f64(record, Some(columns.ndvi), "ndvi", line)?
        .ok_or(ObservationError::MissingValue { line, field: "ndvi" })?;
    let precipitation_mm = parse_optional_f64(
        record,
        Some(columns.precipitation_mm),
        "precipitation_mm",
        line,
    )?
    .ok_or(ObservationError::MissingValue {
        line,
        field: "precipitation_mm",
    })?;
    if precipitation_mm < 0.0 {
        return Err(ObservationError::NegativePrecipitation {
            line,
            value: precipitation_mm,
        });
    }

    Ok(Observation {
        year,
        month,
        ndvi,
        precipitation_mm,
        temp_mean_c: parse_optional_f64(record, columns.temp_mean_c, "temp_mean_c", line)?,
        temp_max_c: parse_optional_f64(record, columns.temp_max_c, "temp_max_c", line)?,
        temp_min_c: parse_optional_f64(record, columns.temp_min_c, "temp_min_c", line)?,
    })
}

fn parse_year_month(
    record: &StringRecord,
    idx: usize,
    line: u64,
) -> Result<(i32, u32), ObservationError> {
    let raw = record.get(idx).unwrap_or_default();
    // Monthly exports write `YYYY-MM`; daily-style dates are accepted too.
    let parsed = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| ObservationError::ParseField {
            line,
            field: "date",
            value: raw.to_string(),
        })?;
    Ok((parsed.year(), parsed.month()))
}

fn parse_i32(
    record: &StringRecord,
    idx: usize,
    field: &'static str,
    line: u64,
) -> Result<i32, ObservationError> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<i32>().map_err(|_| ObservationError::ParseField {
        line,
        field,
        value: raw.to_string(),
    })
}

fn parse_u32(
    record: &StringRecord,
    idx: usize,
    field: &'static str,
    line: u64,
) -> Result<u32, ObservationError> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<u32>().map_err(|_| ObservationError::ParseField {
        line,
        field,
        value: raw.to_string(),
    })
}

fn parse_optional_f64(
    record: &StringRecord,
    idx: Option<usize>,
    field: &'static str,
    line: u64,
) -> Result<Option<f64>, ObservationError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value = raw.parse::<f64>().map_err(|_| ObservationError::ParseField {
        line,
        field,
        value: raw.to_string(),
    })?;
    Ok(value.is_finite().then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_mapping_covers_every_month() {
        let expected = [
            (1, Season::Winter),
            (2, Season::Winter),
            (3, Season::Summer),
            (5, Season::Summer),
            (6, Season::Monsoon),
            (9, Season::Monsoon),
            (10, Season::PostMonsoon),
            (11, Season::PostMonsoon),
            (12, Season::Winter),
        ];
        for (month, season) in expected {
            assert_eq!(Season::from_month(month).expect("valid month"), season);
        }
        assert!(matches!(
            Season::from_month(13),
            Err(ObservationError::InvalidMonth(13))
        ));
        assert_eq!(Season::PostMonsoon.as_str(), "Post-Monsoon");
    }

    #[test]
    fn reads_year_month_columns_and_blank_temperatures() {
        let csv = "year,month,date,ndvi,precipitation_mm,temp_mean_c,temp_max_c,temp_min_c\n\
                   2015,1,2015-01,0.41,3.2,22.5,29.1,16.0\n\
                   2015,2,2015-02,0.38,0.0,,,\n";
        let rows = read_observations(csv.as_bytes()).expect("parse");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period(), (2015, 1));
        assert_eq!(rows[0].temp_max_c, Some(29.1));
        assert_eq!(rows[1].temp_mean_c, None);
        assert_eq!(rows[1].date_label(), "2015-02");
    }

    #[test]
    fn falls_back_to_date_column() {
        let csv = "date,ndvi,precipitation_mm\n2020-07,0.52,210.4\n2020-08-01,0.55,190.0\n";
        let rows = read_observations(csv.as_bytes()).expect("parse");
        assert_eq!(rows[0].period(), (2020, 7));
        assert_eq!(rows[1].period(), (2020, 8));
    }

    #[test]
    fn missing_ndvi_value_is_an_error() {
        let csv = "year,month,ndvi,precipitation_mm\n2020,1,,12.0\n";
        let err = read_observations(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(
            err,
            ObservationError::MissingValue { field: "ndvi", .. }
        ));
    }

    #[test]
    fn rejects_unparseable_and_negative_values() {
        let csv = "year,month,ndvi,precipitation_mm\n2020,1,abc,12.0\n";
        let err = read_observations(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(
            err,
            ObservationError::ParseField { field: "ndvi", .. }
        ));

        let csv = "year,month,ndvi,precipitation_mm\n2020,1,0.4,-1.0\n";
        let err = read_observations(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(
            err,
            ObservationError::NegativePrecipitation { .. }
        ));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let csv = "year,month,ndvi\n2020,1,0.4\n";
        let err = read_observations(csv.as_bytes()).expect_err("must fail");
        assert!(matches!(
            err,
            ObservationError::MissingColumn("precipitation_mm")
        ));
    }
}
