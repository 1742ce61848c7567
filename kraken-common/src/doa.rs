//! DOA feed parsing
//!
//! The DOA software publishes its latest estimates as headerless CSV, one
//! row per estimate: 13 base columns, 4 reserved columns, then the power
//! seen at each whole degree from 0 to 359. This module turns that text into
//! [`DoaRecord`]s; fetching it over HTTP is the agent's job.
//!
//! Parsing is lenient per row: a short row or a field that does not coerce
//! drops that row (with a warning) and the rest of the feed is still used.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt::Display;
use tracing::warn;

/// Number of leading measurement columns
pub const BASE_FIELD_COUNT: usize = 13;
/// Reserved columns between the base fields and the spectrum
pub const RESERVED_FIELD_COUNT: usize = 4;
/// One power value per degree
pub const DOA_BIN_COUNT: usize = 360;
/// Minimum columns for a usable row
pub const MIN_FIELD_COUNT: usize = BASE_FIELD_COUNT + RESERVED_FIELD_COUNT + DOA_BIN_COUNT;

/// Column positions of the base fields
mod col {
    pub const EPOCH_TIME: usize = 0;
    pub const MAX_DOA_ANGLE: usize = 1;
    pub const CONFIDENCE: usize = 2;
    pub const RSSI: usize = 3;
    pub const CHANNEL_FREQUENCY: usize = 4;
    pub const ANTENNA_ARRANGEMENT: usize = 5;
    pub const LATENCY: usize = 6;
    pub const STATION_ID: usize = 7;
    pub const LATITUDE: usize = 8;
    pub const LONGITUDE: usize = 9;
    pub const GPS_HEADING: usize = 10;
    pub const COMPASS_HEADING: usize = 11;
    pub const MAIN_HEADING_SENSOR: usize = 12;
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One DOA estimate as reported by the device
///
/// Serialized field names are the feed's column titles, which is what
/// existing dashboards consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoaRecord {
    /// Milliseconds since the Unix epoch
    #[serde(rename = "Epoch Time")]
    pub epoch_time_ms: i64,
    #[serde(rename = "Max DOA Angle (Degrees)")]
    pub max_doa_angle: f64,
    #[serde(rename = "Confidence Value")]
    pub confidence: f64,
    #[serde(rename = "RSSI Power (dB)")]
    pub rssi_db: f64,
    #[serde(rename = "Channel Frequency (Hz)")]
    pub channel_frequency_hz: f64,
    #[serde(rename = "Antenna Arrangement")]
    pub antenna_arrangement: String,
    #[serde(rename = "Latency (ms)")]
    pub latency_ms: f64,
    #[serde(rename = "Station ID")]
    pub station_id: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "GPS Heading")]
    pub gps_heading: f64,
    /// NaN when the device has no compass; serialized as `null`
    #[serde(rename = "Compass Heading")]
    pub compass_heading: f64,
    #[serde(rename = "Main Heading Sensor Used")]
    pub main_heading_sensor: String,
    /// Columns 14-17, passed through untouched
    #[serde(skip)]
    pub reserved: [String; RESERVED_FIELD_COUNT],
    /// `YYYY-MM-DD HH:MM:SSZ`
    pub utc_timestamp: String,
    /// `YYYY-MM-DD HH:MM:SS <zone>` in the host's zone, e.g. `... CET`
    pub local_timestamp: String,
    /// Power per degree, index = degree
    #[serde(rename = "DOA Output", serialize_with = "serialize_doa_output")]
    pub doa_output: Vec<f64>,
}

impl DoaRecord {
    /// Power at `degree` (0..360)
    pub fn power_at(&self, degree: usize) -> Option<f64> {
        self.doa_output.get(degree).copied()
    }
}

/// `{"0": p0, "1": p1, ... "359": p359}`
fn serialize_doa_output<S: Serializer>(powers: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(powers.len()))?;
    for (degree, power) in powers.iter().enumerate() {
        map.serialize_entry(&degree.to_string(), power)?;
    }
    map.end()
}

/// Why a single row was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    TooFewFields { found: usize },
    InvalidNumber { field: &'static str, value: String },
    EpochOutOfRange(i64),
}

impl Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::TooFewFields { found } => write!(
                f,
                "insufficient fields ({} of {})",
                found, MIN_FIELD_COUNT
            ),
            RowError::InvalidNumber { field, value } => {
                write!(f, "{} is not a number: {:?}", field, value)
            }
            RowError::EpochOutOfRange(ms) => write!(f, "epoch time {} is out of range", ms),
        }
    }
}

/// Parse a DOA feed body, timestamps rendered in the host's local zone
///
/// The zone abbreviation (`CET`, `EST`) is used when the host zone resolves
/// to a tz database name; otherwise the numeric offset is shown.
pub fn parse_doa_csv(body: &str) -> Vec<DoaRecord> {
    match host_zone() {
        Some(zone) => parse_doa_csv_in(body, &zone),
        None => parse_doa_csv_in(body, &Local),
    }
}

/// The host's zone: `TZ` if set, else the system setting
pub fn host_zone() -> Option<chrono_tz::Tz> {
    let name = match std::env::var("TZ") {
        Ok(tz) if !tz.trim().is_empty() => tz.trim().trim_start_matches(':').to_string(),
        _ => iana_time_zone::get_timezone().ok()?,
    };
    name.parse::<chrono_tz::Tz>().ok()
}

/// Parse a DOA feed body, rendering `local_timestamp` in `zone`
///
/// Rows that fail are logged and skipped. A CSV decode error abandons the
/// whole body and yields no records.
pub fn parse_doa_csv_in<Tz>(body: &str, zone: &Tz) -> Vec<DoaRecord>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line_number = index + 1;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Error processing DOA CSV content: {}", e);
                return Vec::new();
            }
        };

        let fields: Vec<&str> = row.iter().collect();
        match parse_row(&fields, zone) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping DOA row {}: {}", line_number, e),
        }
    }
    records
}

/// Map one CSV row onto a record
pub fn parse_row<Tz>(fields: &[&str], zone: &Tz) -> Result<DoaRecord, RowError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if fields.len() < MIN_FIELD_COUNT {
        return Err(RowError::TooFewFields {
            found: fields.len(),
        });
    }

    let epoch_time_ms: i64 = parse_field(fields, col::EPOCH_TIME, "Epoch Time")?;
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_time_ms)
        .ok_or(RowError::EpochOutOfRange(epoch_time_ms))?;
    let local = utc.with_timezone(zone);

    let compass_raw = fields[col::COMPASS_HEADING].trim();
    let compass_heading = if compass_raw.is_empty() {
        f64::NAN
    } else {
        parse_field(fields, col::COMPASS_HEADING, "Compass Heading")?
    };

    let reserved_start = BASE_FIELD_COUNT;
    let reserved = std::array::from_fn(|i| fields[reserved_start + i].to_string());

    let doa_start = BASE_FIELD_COUNT + RESERVED_FIELD_COUNT;
    let doa_output = (0..DOA_BIN_COUNT)
        .map(|degree| parse_field(fields, doa_start + degree, "DOA Power"))
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(DoaRecord {
        epoch_time_ms,
        max_doa_angle: parse_field(fields, col::MAX_DOA_ANGLE, "Max DOA Angle (Degrees)")?,
        confidence: parse_field(fields, col::CONFIDENCE, "Confidence Value")?,
        rssi_db: parse_field(fields, col::RSSI, "RSSI Power (dB)")?,
        channel_frequency_hz: parse_field(fields, col::CHANNEL_FREQUENCY, "Channel Frequency (Hz)")?,
        antenna_arrangement: fields[col::ANTENNA_ARRANGEMENT].to_string(),
        latency_ms: parse_field(fields, col::LATENCY, "Latency (ms)")?,
        station_id: fields[col::STATION_ID].to_string(),
        latitude: parse_field(fields, col::LATITUDE, "Latitude")?,
        longitude: parse_field(fields, col::LONGITUDE, "Longitude")?,
        gps_heading: parse_field(fields, col::GPS_HEADING, "GPS Heading")?,
        compass_heading,
        main_heading_sensor: fields[col::MAIN_HEADING_SENSOR].to_string(),
        reserved,
        utc_timestamp: format!("{}Z", utc.format(TIMESTAMP_FORMAT)),
        local_timestamp: format!("{} {}", local.format(TIMESTAMP_FORMAT), local.offset()),
        doa_output,
    })
}

fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    position: usize,
    field: &'static str,
) -> Result<T, RowError> {
    let raw = fields[position];
    raw.trim().parse().map_err(|_| RowError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}
