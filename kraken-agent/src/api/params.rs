//! Query-string decoding and per-endpoint request validation
//!
//! Query strings are first collected into [`QueryParams`]: a key given once
//! is unwrapped to a single value, `true`/`false` in any case become
//! booleans, and a repeated key stays a list. Each settings endpoint then
//! has a request type that checks presence, type and range in one step and
//! turns the request into a [`SettingsUpdate`].

use super::envelope::ApiError;
use kraken_common::{Coordinates, SettingsUpdate};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Center frequency limits, MHz
pub const FREQUENCY_RANGE_MHZ: RangeInclusive<f64> = 24.0..=1766.0;
/// VFO frequency limits, Hz
pub const VFO_FREQUENCY_RANGE_HZ: RangeInclusive<f64> = 24.0e6..=1766.0e6;
/// Widest VFO the RTL-SDR front end can deliver, Hz
pub const MAX_VFO_BANDWIDTH_HZ: f64 = 2.4e6;

/// One decoded query value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Bool(bool),
    List(Vec<String>),
}

impl ParamValue {
    fn single(raw: String) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            ParamValue::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            ParamValue::Bool(false)
        } else {
            ParamValue::Text(raw)
        }
    }

    /// Finite floating point value
    pub fn to_f64(&self, key: &str) -> Result<f64, ApiError> {
        let text = self.text(key, "a number")?;
        match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(invalid(key, "a number", text)),
        }
    }

    pub fn to_i64(&self, key: &str) -> Result<i64, ApiError> {
        let text = self.text(key, "an integer")?;
        text.trim()
            .parse::<i64>()
            .map_err(|_| invalid(key, "an integer", text))
    }

    pub fn to_bool(&self, key: &str) -> Result<bool, ApiError> {
        match self {
            ParamValue::Bool(value) => Ok(*value),
            ParamValue::Text(text) => Err(invalid(key, "true or false", text)),
            ParamValue::List(_) => Err(ApiError::validation(format!(
                "Invalid value for {}: expected true or false, got several values",
                key
            ))),
        }
    }

    /// Text form; booleans render as `true`/`false`
    pub fn to_text(&self, key: &str) -> Result<String, ApiError> {
        match self {
            ParamValue::Text(text) => Ok(text.clone()),
            ParamValue::Bool(value) => Ok(value.to_string()),
            ParamValue::List(_) => Err(ApiError::validation(format!(
                "Invalid value for {}: expected a single value, got several",
                key
            ))),
        }
    }

    /// JSON form, as stored when the settings key takes whatever was sent
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(text) => Value::String(text.clone()),
            ParamValue::Bool(value) => Value::Bool(*value),
            ParamValue::List(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }

    fn text(&self, key: &str, expected: &str) -> Result<&str, ApiError> {
        match self {
            ParamValue::Text(text) => Ok(text),
            ParamValue::Bool(value) => Err(invalid(key, expected, &value.to_string())),
            ParamValue::List(_) => Err(ApiError::validation(format!(
                "Invalid value for {}: expected {}, got several values",
                key, expected
            ))),
        }
    }
}

fn invalid(key: &str, expected: &str, got: &str) -> ApiError {
    ApiError::validation(format!(
        "Invalid value for {}: expected {}, got {:?}",
        key, expected, got
    ))
}

/// Decoded query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    values: HashMap<String, ParamValue>,
}

impl QueryParams {
    /// Group decoded `key=value` pairs, preserving the order of repeats
    ///
    /// Blank values are dropped, so `freq=` reads as if `freq` were absent.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            if value.is_empty() {
                continue;
            }
            grouped.entry(key).or_default().push(value);
        }

        let values = grouped
            .into_iter()
            .map(|(key, mut raw)| {
                let value = if raw.len() == 1 {
                    ParamValue::single(raw.remove(0))
                } else {
                    ParamValue::List(raw)
                };
                (key, value)
            })
            .collect();

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fetch a mandatory key; `expecting` is shown to the client if absent
    pub fn require(&self, key: &str, expecting: &str) -> Result<&ParamValue, ApiError> {
        self.get(key).ok_or_else(|| {
            ApiError::validation(format!(
                "Correct key not specified in request.  Expecting {}",
                expecting
            ))
        })
    }
}

/// A settings-changing request decoded from the query string
pub trait SettingsRequest: Sized + Send + 'static {
    /// Validate the parameters this endpoint needs
    fn from_query(params: &QueryParams) -> Result<Self, ApiError>;

    /// Everything this request changes, applied in one write
    fn into_update(self) -> Result<SettingsUpdate, ApiError>;
}

fn check_frequency_mhz(freq: f64) -> Result<f64, ApiError> {
    if !FREQUENCY_RANGE_MHZ.contains(&freq) {
        return Err(ApiError::validation(
            "Frequency range error.  Value should be in MHz and range from 24.0 - 1766.0",
        ));
    }
    Ok(freq)
}

fn check_vfo_frequency_hz(freq: f64, label: &str) -> Result<f64, ApiError> {
    if !VFO_FREQUENCY_RANGE_HZ.contains(&freq) {
        return Err(ApiError::validation(format!(
            "{} range error.  Value should be in Hz and range from 24000000 - 1766000000",
            label
        )));
    }
    Ok(freq)
}

/// `set_frequency?freq=<MHz>[&gain=<dB>]`
#[derive(Debug, Clone, PartialEq)]
pub struct SetFrequencyRequest {
    pub freq_mhz: f64,
    pub gain: Option<f64>,
}

impl SettingsRequest for SetFrequencyRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let freq = params.require("freq", "freq=<value>")?.to_f64("freq")?;
        let freq_mhz = check_frequency_mhz(freq)?;
        let gain = params
            .get("gain")
            .map(|value| value.to_f64("gain"))
            .transpose()?;
        Ok(Self { freq_mhz, gain })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        let update = SettingsUpdate::new().frequency(self.freq_mhz);
        match self.gain {
            Some(gain) => Ok(update.gain(gain)?),
            None => Ok(update),
        }
    }
}

/// `set_frequency_and_vfo?freq=<MHz>&vfo_index=<int>&vfo_freq=<Hz>`
#[derive(Debug, Clone, PartialEq)]
pub struct SetFrequencyAndVfoRequest {
    pub freq_mhz: f64,
    pub vfo_index: i64,
    pub vfo_freq_hz: f64,
}

impl SettingsRequest for SetFrequencyAndVfoRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let freq = params.require("freq", "freq=<value>")?;
        let index = params.require("vfo_index", "vfo_index=<index>")?;
        let vfo_freq = params.require("vfo_freq", "vfo_freq=<value in Hz>")?;

        let freq_mhz = check_frequency_mhz(freq.to_f64("freq")?)?;
        let vfo_index = index.to_i64("vfo_index")?;
        let vfo_freq_hz = check_vfo_frequency_hz(vfo_freq.to_f64("vfo_freq")?, "VFO Frequency")?;

        Ok(Self {
            freq_mhz,
            vfo_index,
            vfo_freq_hz,
        })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new()
            .frequency(self.freq_mhz)
            .vfo_frequency(self.vfo_index, self.vfo_freq_hz))
    }
}

/// `set_gain?gain=<dB>`
#[derive(Debug, Clone, PartialEq)]
pub struct SetGainRequest {
    pub gain: f64,
}

impl SettingsRequest for SetGainRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let gain = params.require("gain", "gain=<value>")?.to_f64("gain")?;
        Ok(Self { gain })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().gain(self.gain)?)
    }
}

/// `set_output_vfo?vfo_index=<int>`
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutputVfoRequest {
    pub vfo_index: i64,
}

impl SettingsRequest for SetOutputVfoRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let vfo_index = params
            .require("vfo_index", "vfo_index=<index>")?
            .to_i64("vfo_index")?;
        Ok(Self { vfo_index })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().output_vfo(self.vfo_index))
    }
}

/// `en_optimize_short_bursts?state=<true|false>`
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeShortBurstsRequest {
    pub state: bool,
}

impl SettingsRequest for OptimizeShortBurstsRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let state = params
            .require("state", "state=[true|false]")?
            .to_bool("state")?;
        Ok(Self { state })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().optimize_short_bursts(self.state))
    }
}

/// `set_vfo_frequency?vfo_index=<int>&vfo_freq=<Hz>`
#[derive(Debug, Clone, PartialEq)]
pub struct SetVfoFrequencyRequest {
    pub vfo_index: i64,
    pub vfo_freq_hz: f64,
}

impl SettingsRequest for SetVfoFrequencyRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let index = params.require("vfo_index", "vfo_index=<index>")?;
        let freq = params.require("vfo_freq", "vfo_freq=<value in Hz>")?;

        let vfo_index = index.to_i64("vfo_index")?;
        let vfo_freq_hz = check_vfo_frequency_hz(freq.to_f64("vfo_freq")?, "Frequency")?;
        Ok(Self {
            vfo_index,
            vfo_freq_hz,
        })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().vfo_frequency(self.vfo_index, self.vfo_freq_hz))
    }
}

/// `set_vfo_bandwidth?vfo_index=<int>&vfo_bw=<Hz>`
#[derive(Debug, Clone, PartialEq)]
pub struct SetVfoBandwidthRequest {
    pub vfo_index: i64,
    pub vfo_bw_hz: f64,
}

impl SettingsRequest for SetVfoBandwidthRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let index = params.require("vfo_index", "vfo_index=<index>")?;
        let bandwidth = params.require("vfo_bw", "vfo_bw=<value in Hz>")?;

        let vfo_index = index.to_i64("vfo_index")?;
        let vfo_bw_hz = bandwidth.to_f64("vfo_bw")?;
        if vfo_bw_hz <= 0.0 || vfo_bw_hz > MAX_VFO_BANDWIDTH_HZ {
            return Err(ApiError::validation(
                "Bandwidth error.  Value should be in Hz and not exceed RTLSDR bandwidth",
            ));
        }
        Ok(Self {
            vfo_index,
            vfo_bw_hz,
        })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().vfo_bandwidth(self.vfo_index, self.vfo_bw_hz))
    }
}

/// `set_coordinates?latitude=<f>&longitude=<f>[&heading...]`
///
/// Keys other than the recognised location fields are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCoordinatesRequest {
    pub coordinates: Coordinates,
}

impl SettingsRequest for SetCoordinatesRequest {
    fn from_query(params: &QueryParams) -> Result<Self, ApiError> {
        let (Some(latitude), Some(longitude)) = (params.get("latitude"), params.get("longitude"))
        else {
            return Err(ApiError::validation(
                "Correct key not specified in request.  latitude and longitude",
            ));
        };

        let coordinates = Coordinates {
            latitude: latitude.to_f64("latitude")?,
            longitude: longitude.to_f64("longitude")?,
            heading: params
                .get("heading")
                .map(|v| v.to_f64("heading"))
                .transpose()?,
            location_source: params
                .get("location_source")
                .map(|v| v.to_text("location_source"))
                .transpose()?,
            gps_fixed_heading: params.get("gps_fixed_heading").map(ParamValue::to_json),
            gps_min_speed: params
                .get("gps_min_speed")
                .map(|v| v.to_i64("gps_min_speed"))
                .transpose()?,
            gps_min_speed_duration: params
                .get("gps_min_speed_duration")
                .map(|v| v.to_i64("gps_min_speed_duration"))
                .transpose()?,
        };
        Ok(Self { coordinates })
    }

    fn into_update(self) -> Result<SettingsUpdate, ApiError> {
        Ok(SettingsUpdate::new().coordinates(&self.coordinates))
    }
}
