//! Trip record ingestion and cleaning
//!
//! Quarterly trip files share one schema: trip id, start and stop time, bike
//! id, duration in seconds, origin and destination station ids and names, and
//! user type. Column headers are matched loosely since their capitalisation
//! and spacing vary between releases.

use crate::config::{RowPolicy, DEFAULT_FAILED_RIDE_SECONDS};
use crate::error::{ForecastError, Result};
use crate::utils::date_parser::parse_timestamp;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// One bike trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip_id: u64,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    pub bike_id: Option<u64>,
    /// Duration as reported by the operator; `None` when the field is malformed
    pub duration_seconds: Option<f64>,
    /// Station codes are kept verbatim; newer releases use alphanumeric ids
    pub from_station_id: Option<String>,
    pub from_station_name: Option<String>,
    pub to_station_id: Option<String>,
    pub to_station_name: Option<String>,
    pub user_type: Option<String>,
}

impl TripRecord {
    /// Whether this trip is a failed ride under the given duration threshold
    ///
    /// A trip is failed when it starts and ends at the same station and lasts
    /// less than `max_seconds`. A missing station id or a missing or malformed
    /// duration never classifies a trip as failed.
    pub fn is_failed_ride(&self, max_seconds: f64) -> bool {
        match (
            &self.from_station_id,
            &self.to_station_id,
            self.duration_seconds,
        ) {
            (Some(from), Some(to), Some(duration)) => from == to && duration < max_seconds,
            _ => false,
        }
    }
}

/// Failed-ride check with the standard 120 second threshold
pub fn is_failed_ride(trip: &TripRecord) -> bool {
    trip.is_failed_ride(DEFAULT_FAILED_RIDE_SECONDS)
}

/// Remove failed rides
///
/// Returns the retained trips in their original order together with the
/// number of trips removed.
pub fn clean(trips: Vec<TripRecord>, max_seconds: f64) -> (Vec<TripRecord>, usize) {
    let total = trips.len();
    let retained: Vec<TripRecord> = trips
        .into_iter()
        .filter(|t| !t.is_failed_ride(max_seconds))
        .collect();
    let removed = total - retained.len();
    info!(total, removed, retained = retained.len(), "Removed failed rides");
    (retained, removed)
}

/// Counters describing one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files read
    pub files: usize,
    /// Data rows seen, excluding headers
    pub rows_read: usize,
    /// Rows dropped as malformed under [`RowPolicy::Skip`]
    pub rows_skipped: usize,
    /// Rows dropped because their trip id was already loaded
    pub duplicates: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: &IngestReport) {
        self.files += other.files;
        self.rows_read += other.rows_read;
        self.rows_skipped += other.rows_skipped;
        self.duplicates += other.duplicates;
    }
}

/// Trips loaded from one or more files
#[derive(Debug, Clone, Default)]
pub struct TripBatch {
    pub trips: Vec<TripRecord>,
    pub report: IngestReport,
}

/// Positions of the trip fields within a CSV header
#[derive(Debug, Clone)]
struct TripColumns {
    trip_id: usize,
    start_time: usize,
    stop_time: usize,
    bike_id: Option<usize>,
    duration: usize,
    from_station_id: usize,
    from_station_name: Option<usize>,
    to_station_id: usize,
    to_station_name: Option<usize>,
    user_type: Option<usize>,
}

impl TripColumns {
    /// Detect trip columns in a header row
    fn detect(headers: &StringRecord) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |candidates: &[&str]| {
            normalized
                .iter()
                .position(|h| candidates.iter().any(|c| h == c))
        };
        let require = |name: &str, candidates: &[&str]| {
            find(candidates).ok_or_else(|| {
                ForecastError::DataError(format!("No '{}' column found in trip file", name))
            })
        };

        Ok(Self {
            trip_id: require("trip id", &["tripid"])?,
            start_time: require("start time", &["starttime", "startdate"])?,
            stop_time: require("stop time", &["stoptime", "enddate", "endtime"])?,
            bike_id: find(&["bikeid", "bikenumber"]),
            duration: require("trip duration", &["tripduration", "duration"])?,
            from_station_id: require(
                "from station id",
                &["fromstationid", "startstationid", "originstationid"],
            )?,
            from_station_name: find(&["fromstationname", "startstationname"]),
            to_station_id: require(
                "to station id",
                &["tostationid", "endstationid", "destinationstationid"],
            )?,
            to_station_name: find(&["tostationname", "endstationname"]),
            user_type: find(&["usertype", "membertype"]),
        })
    }
}

fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> Option<&'r str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn lenient_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Loader for quarterly trip files
#[derive(Debug, Clone, Copy, Default)]
pub struct TripLoader {
    policy: RowPolicy,
}

impl TripLoader {
    /// Create a loader with the given malformed-row policy
    pub fn new(policy: RowPolicy) -> Self {
        Self { policy }
    }

    /// Load one trip file with the default (skip) policy
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TripBatch> {
        Self::default().load_csv(path)
    }

    /// Load and concatenate several trip files with the default policy
    pub fn from_csv_files<P: AsRef<Path>>(paths: &[P]) -> Result<TripBatch> {
        Self::default().load_files(paths)
    }

    /// Load trips from an in-memory or streamed CSV with the default policy
    pub fn from_reader<R: Read>(reader: R) -> Result<TripBatch> {
        Self::default().load_reader(reader, "reader")
    }

    /// Load one trip file
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> Result<TripBatch> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let batch = self.load_reader(file, &path.display().to_string())?;
        info!(
            path = %path.display(),
            trips = batch.trips.len(),
            skipped = batch.report.rows_skipped,
            "Loaded trip file"
        );
        Ok(batch)
    }

    /// Load several trip files into one batch
    ///
    /// Files are concatenated in the given order. A trip id seen in an earlier
    /// file or row wins; later repeats are dropped and counted.
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<TripBatch> {
        if paths.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one trip file is required".to_string(),
            ));
        }

        let mut combined = TripBatch::default();
        let mut seen: HashSet<u64> = HashSet::new();

        for path in paths {
            let batch = self.load_csv(path)?;
            combined.report.absorb(&batch.report);
            for trip in batch.trips {
                if seen.insert(trip.trip_id) {
                    combined.trips.push(trip);
                } else {
                    combined.report.duplicates += 1;
                }
            }
        }

        if combined.report.duplicates > 0 {
            warn!(
                duplicates = combined.report.duplicates,
                "Dropped trips with repeated trip ids"
            );
        }

        Ok(combined)
    }

    /// Load trips from any reader producing CSV with a header row
    pub fn load_reader<R: Read>(&self, reader: R, source: &str) -> Result<TripBatch> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let columns = TripColumns::detect(csv_reader.headers()?)?;
        debug!(source, ?columns, "Detected trip columns");

        let mut batch = TripBatch {
            trips: Vec::new(),
            report: IngestReport {
                files: 1,
                ..Default::default()
            },
        };
        let mut seen: HashSet<u64> = HashSet::new();

        for row in csv_reader.records() {
            let record = row?;
            batch.report.rows_read += 1;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            match parse_trip(&record, &columns) {
                Ok(trip) => {
                    if seen.insert(trip.trip_id) {
                        batch.trips.push(trip);
                    } else {
                        batch.report.duplicates += 1;
                    }
                }
                Err(reason) => match self.policy {
                    RowPolicy::Abort => return Err(ForecastError::MalformedRow { line, reason }),
                    RowPolicy::Skip => {
                        warn!(source, line, %reason, "Skipping malformed trip row");
                        batch.report.rows_skipped += 1;
                    }
                },
            }
        }

        Ok(batch)
    }
}

/// Turn one CSV row into a trip, or explain why it is malformed
fn parse_trip(
    record: &StringRecord,
    columns: &TripColumns,
) -> std::result::Result<TripRecord, String> {
    let trip_id = field(record, columns.trip_id)
        .ok_or_else(|| "missing trip id".to_string())?
        .replace(',', "")
        .parse::<u64>()
        .map_err(|e| format!("invalid trip id: {}", e))?;

    let timestamp = |idx: usize, name: &str| {
        let raw = field(record, idx).ok_or_else(|| format!("missing {}", name))?;
        parse_timestamp(raw).map_err(|_| format!("unparseable {} '{}'", name, raw))
    };
    let start_time = timestamp(columns.start_time, "start time")?;
    let stop_time = timestamp(columns.stop_time, "stop time")?;

    let optional = |idx: Option<usize>| idx.and_then(|i| field(record, i)).map(str::to_string);

    Ok(TripRecord {
        trip_id,
        start_time,
        stop_time,
        bike_id: columns
            .bike_id
            .and_then(|i| field(record, i))
            .and_then(|s| s.parse::<u64>().ok()),
        duration_seconds: field(record, columns.duration)
            .and_then(lenient_number)
            .filter(|v| *v >= 0.0),
        from_station_id: field(record, columns.from_station_id).map(str::to_string),
        from_station_name: optional(columns.from_station_name),
        to_station_id: field(record, columns.to_station_id).map(str::to_string),
        to_station_name: optional(columns.to_station_name),
        user_type: optional(columns.user_type),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Trip id,Starttime,Stoptime,Bikeid,Tripduration,From station id,From station name,To station id,To station name,Usertype";

    fn load(body: &str, policy: RowPolicy) -> Result<TripBatch> {
        let data = format!("{}\n{}", HEADER, body);
        TripLoader::new(policy).load_reader(data.as_bytes(), "inline")
    }

    #[test]
    fn test_parses_standard_row() {
        let batch = load(
            "7,1/1/2015 0:14,1/1/2015 0:19,70379,310,1049,Penn Ave & 17th St,1010,10th St & Penn Ave,Subscriber",
            RowPolicy::Abort,
        )
        .unwrap();
        let trip = &batch.trips[0];
        assert_eq!(trip.trip_id, 7);
        assert_eq!(trip.duration_seconds, Some(310.0));
        assert_eq!(trip.from_station_id.as_deref(), Some("1049"));
        assert_eq!(trip.to_station_id.as_deref(), Some("1010"));
        assert_eq!(trip.user_type.as_deref(), Some("Subscriber"));
    }

    #[test]
    fn test_malformed_duration_keeps_row_as_not_failed() {
        let batch = load(
            "8,1/1/2015 0:14,1/1/2015 0:15,70379,n/a,1049,A,1049,A,Customer",
            RowPolicy::Abort,
        )
        .unwrap();
        assert_eq!(batch.trips.len(), 1);
        assert_eq!(batch.trips[0].duration_seconds, None);
        assert!(!is_failed_ride(&batch.trips[0]));
    }

    #[test]
    fn test_skip_policy_counts_bad_timestamps() {
        let batch = load(
            "1,yesterday,1/1/2015 0:19,1,300,1,A,2,B,Customer\n2,1/1/2015 1:00,1/1/2015 1:05,1,300,1,A,2,B,Customer",
            RowPolicy::Skip,
        )
        .unwrap();
        assert_eq!(batch.trips.len(), 1);
        assert_eq!(batch.report.rows_read, 2);
        assert_eq!(batch.report.rows_skipped, 1);
    }

    #[test]
    fn test_alphanumeric_station_codes_are_compared() {
        let batch = load(
            "11,4/2/2017 9:00,4/2/2017 9:00,7,30,KA1504000097,A,KA1504000097,A,Member\n12,4/2/2017 9:10,4/2/2017 9:11,7,30,KA1504000097,A,KA1504000133,B,Member",
            RowPolicy::Abort,
        )
        .unwrap();
        assert_eq!(
            batch.trips[0].from_station_id.as_deref(),
            Some("KA1504000097")
        );
        let (retained, removed) = clean(batch.trips, 120.0);
        assert_eq!(removed, 1);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].trip_id, 12);
    }

    #[test]
    fn test_abort_policy_reports_line() {
        let err = load("1,yesterday,1/1/2015 0:19,1,300,1,A,2,B,Customer", RowPolicy::Abort)
            .unwrap_err();
        assert!(matches!(err, ForecastError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn test_missing_required_column() {
        let data = "Trip id,Starttime\n1,1/1/2015 0:14\n";
        let result = TripLoader::default().load_reader(data.as_bytes(), "inline");
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_header_normalization() {
        assert_eq!(normalize_header(" From Station ID "), "fromstationid");
        assert_eq!(normalize_header("trip_id"), "tripid");
    }
}
