use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use super::error::SimulationError;

const DATE_COLUMN: &str = "Date";
const PRICE_COLUMNS: [&str; 3] = ["Adj Close", "Close", "Price"];

/// Daily closing prices in ascending date order. Validated once on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    dates: Vec<NaiveDate>,
    prices: Vec<f64>,
}

impl PriceSeries {
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self, SimulationError> {
        if points.is_empty() {
            return Err(SimulationError::data("price series is empty"));
        }

        for (idx, &(date, price)) in points.iter().enumerate() {
            if !price.is_finite() || price <= 0.0 {
                return Err(SimulationError::data(format!(
                    "price {price} on {date} must be finite and > 0"
                )));
            }
            if idx > 0 && points[idx - 1].0 >= date {
                return Err(SimulationError::data(format!(
                    "dates must be strictly increasing: {} is followed by {date}",
                    points[idx - 1].0
                )));
            }
        }

        let (dates, prices) = points.into_iter().unzip();
        Ok(Self { dates, prices })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read price csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("price csv has no `Date` column")]
    MissingDateColumn,

    #[error("price csv has no `Adj Close`, `Close` or `Price` column")]
    MissingPriceColumn,

    #[error("line {line}: cannot parse {field} `{value}`")]
    Parse {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Data(#[from] SimulationError),
}

pub fn load_price_csv(path: &Path) -> Result<PriceSeries, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let series = read_prices(reader)?;
    debug!(
        path = %path.display(),
        prices = series.len(),
        "loaded price series"
    );
    Ok(series)
}

pub fn parse_price_csv<R: Read>(input: R) -> Result<PriceSeries, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_prices(reader)
}

fn read_prices<R: Read>(mut reader: csv::Reader<R>) -> Result<PriceSeries, LoadError> {
    let headers = reader.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h == DATE_COLUMN)
        .ok_or(LoadError::MissingDateColumn)?;
    let price_idx = PRICE_COLUMNS
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .ok_or(LoadError::MissingPriceColumn)?;

    let mut points = Vec::new();
    let mut skipped = 0_u64;
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        // Providers leave the close blank on non-trading rows.
        let raw_price = record.get(price_idx).unwrap_or("");
        if raw_price.is_empty() || raw_price.eq_ignore_ascii_case("nan") {
            skipped += 1;
            continue;
        }

        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| LoadError::Parse {
            line,
            field: "date",
            value: raw_date.to_string(),
        })?;
        let price = raw_price.parse::<f64>().map_err(|_| LoadError::Parse {
            line,
            field: "price",
            value: raw_price.to_string(),
        })?;
        points.push((date, price));
    }

    if skipped > 0 {
        warn!(skipped, "skipped price rows with no close");
    }

    Ok(PriceSeries::new(points)?)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Some exports append a time component to the date.
    let day = raw.split([' ', 'T']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn new_rejects_empty_series() {
        let err = PriceSeries::new(Vec::new()).expect_err("must reject empty");
        assert!(matches!(err, SimulationError::Data { .. }));
    }

    #[test]
    fn new_rejects_non_positive_price() {
        let err = PriceSeries::new(vec![(day(2020, 1, 2), 100.0), (day(2020, 1, 3), 0.0)])
            .expect_err("must reject zero price");
        assert!(err.to_string().contains("must be finite and > 0"));
    }

    #[test]
    fn new_rejects_nan_price() {
        let err = PriceSeries::new(vec![(day(2020, 1, 2), f64::NAN)])
            .expect_err("must reject NaN price");
        assert!(matches!(err, SimulationError::Data { .. }));
    }

    #[test]
    fn new_rejects_unsorted_and_duplicate_dates() {
        let unsorted = PriceSeries::new(vec![(day(2020, 1, 3), 100.0), (day(2020, 1, 2), 101.0)]);
        assert!(unsorted.is_err());

        let duplicate = PriceSeries::new(vec![(day(2020, 1, 2), 100.0), (day(2020, 1, 2), 101.0)]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn parse_prefers_adjusted_close_and_skips_blank_rows() {
        let csv = "Date,Open,Close,Adj Close\n\
                   2020-01-02,1,10,100.5\n\
                   2020-01-03,1,11,\n\
                   2020-01-06 00:00:00,1,12,102.25\n";
        let series = parse_price_csv(csv.as_bytes()).expect("valid csv");

        assert_eq!(series.len(), 2);
        assert_eq!(series.prices(), &[100.5, 102.25]);
        assert_eq!(series.first_date(), Some(day(2020, 1, 2)));
        assert_eq!(series.last_date(), Some(day(2020, 1, 6)));
    }

    #[test]
    fn parse_falls_back_to_price_column() {
        let csv = "Date,Price\n2021-03-01,50\n2021-03-02,51\n";
        let series = parse_price_csv(csv.as_bytes()).expect("valid csv");
        assert_eq!(series.prices(), &[50.0, 51.0]);
    }

    #[test]
    fn parse_reports_missing_columns() {
        let no_date = parse_price_csv("Day,Close\n2020-01-02,1\n".as_bytes());
        assert!(matches!(no_date, Err(LoadError::MissingDateColumn)));

        let no_price = parse_price_csv("Date,Volume\n2020-01-02,1\n".as_bytes());
        assert!(matches!(no_price, Err(LoadError::MissingPriceColumn)));
    }

    #[test]
    fn parse_reports_bad_values_with_line() {
        let err = parse_price_csv("Date,Close\n2020-01-02,abc\n".as_bytes())
            .expect_err("must reject bad price");
        match err {
            LoadError::Parse { line, field, value } => {
                assert_eq!(line, 2);
                assert_eq!(field, "price");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn parse_surfaces_data_errors() {
        let err = parse_price_csv("Date,Close\n2020-01-03,1\n2020-01-02,2\n".as_bytes())
            .expect_err("must reject unsorted dates");
        assert!(matches!(err, LoadError::Data(SimulationError::Data { .. })));
    }
}
