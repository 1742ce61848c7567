//! Settings document access
//!
//! The radio's own control loop watches `settings.json` and reloads it on
//! change, so the document is never edited in place. Every change is a full
//! read-merge-write, and the write lands in a temp file that is renamed over
//! the original so a reader only ever sees a complete document.
//!
//! Callers that need several keys changed together (frequency and gain, for
//! example) collect them in a [`SettingsUpdate`] and hand the whole set to
//! [`SettingsStore::apply`], which performs exactly one write.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// File name of the settings document inside the settings directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// The settings document: a flat, ordered key/value mapping
pub type SettingsDocument = Map<String, Value>;

/// Gain steps supported by the tuner, in dB
pub const VALID_GAINS: [f64; 29] = [
    0.0, 0.9, 1.4, 2.7, 3.7, 7.7, 8.7, 12.5, 14.4, 15.7, 16.6, 19.7, 20.7, 22.9, 25.4, 28.0, 29.7,
    32.8, 33.8, 36.4, 37.2, 38.6, 40.2, 42.1, 43.4, 43.9, 44.5, 48.0, 49.6,
];

/// Returns true if `gain` is exactly one of the tuner gain steps
pub fn is_valid_gain(gain: f64) -> bool {
    VALID_GAINS.iter().any(|step| *step == gain)
}

/// Settings keys read by the device
pub mod keys {
    pub const CENTER_FREQ: &str = "center_freq";
    pub const UNIFORM_GAIN: &str = "uniform_gain";
    pub const OUTPUT_VFO: &str = "output_vfo";
    pub const OPTIMIZE_SHORT_BURSTS: &str = "en_optimize_short_bursts";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const HEADING: &str = "heading";
    pub const LOCATION_SOURCE: &str = "location_source";
    pub const GPS_FIXED_HEADING: &str = "gps_fixed_heading";
    pub const GPS_MIN_SPEED: &str = "gps_min_speed";
    pub const GPS_MIN_SPEED_DURATION: &str = "gps_min_speed_duration";

    /// Key holding the frequency of VFO `index`
    pub fn vfo_freq(index: i64) -> String {
        format!("vfo_freq_{}", index)
    }

    /// Key holding the bandwidth of VFO `index`
    pub fn vfo_bw(index: i64) -> String {
        format!("vfo_bw_{}", index)
    }
}

/// Station position and GPS behaviour
///
/// Latitude and longitude are always written; the remaining fields only
/// when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub location_source: Option<String>,
    /// Stored as supplied (the UI writes either a boolean or text)
    pub gps_fixed_heading: Option<Value>,
    pub gps_min_speed: Option<i64>,
    pub gps_min_speed_duration: Option<i64>,
}

/// A set of key assignments applied to the document in a single write
///
/// Assignments keep insertion order; assigning the same key twice keeps the
/// last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    values: Map<String, Value>,
}

impl SettingsUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a raw key/value assignment
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Center frequency in MHz
    pub fn frequency(self, mhz: f64) -> Self {
        self.set(keys::CENTER_FREQ, mhz)
    }

    /// Uniform receiver gain in dB
    ///
    /// Fails with [`Error::InvalidInput`] if `gain` is not a tuner gain step.
    pub fn gain(self, gain: f64) -> Result<Self> {
        if !is_valid_gain(gain) {
            return Err(Error::InvalidInput(format!(
                "Invalid gain value {}. Gain must be one of {:?}",
                gain, VALID_GAINS
            )));
        }
        Ok(self.set(keys::UNIFORM_GAIN, gain))
    }

    /// VFO whose output is streamed
    pub fn output_vfo(self, index: i64) -> Self {
        self.set(keys::OUTPUT_VFO, index)
    }

    /// Frequency of one VFO in Hz
    pub fn vfo_frequency(self, index: i64, hz: f64) -> Self {
        self.set(keys::vfo_freq(index), hz)
    }

    /// Bandwidth of one VFO in Hz
    pub fn vfo_bandwidth(self, index: i64, hz: f64) -> Self {
        self.set(keys::vfo_bw(index), hz)
    }

    pub fn optimize_short_bursts(self, enabled: bool) -> Self {
        self.set(keys::OPTIMIZE_SHORT_BURSTS, enabled)
    }

    /// Station position plus whichever optional GPS fields are present
    pub fn coordinates(self, coordinates: &Coordinates) -> Self {
        let mut update = self
            .set(keys::LATITUDE, coordinates.latitude)
            .set(keys::LONGITUDE, coordinates.longitude);

        if let Some(heading) = coordinates.heading {
            update = update.set(keys::HEADING, heading);
        }
        if let Some(source) = &coordinates.location_source {
            update = update.set(keys::LOCATION_SOURCE, source.clone());
        }
        if let Some(fixed) = &coordinates.gps_fixed_heading {
            update = update.set(keys::GPS_FIXED_HEADING, fixed.clone());
        }
        if let Some(speed) = coordinates.gps_min_speed {
            update = update.set(keys::GPS_MIN_SPEED, speed);
        }
        if let Some(duration) = coordinates.gps_min_speed_duration {
            update = update.set(keys::GPS_MIN_SPEED_DURATION, duration);
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Staged keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Overlay the staged assignments onto `document`
    pub fn merge_into(&self, document: &mut SettingsDocument) {
        for (key, value) in &self.values {
            document.insert(key.clone(), value.clone());
        }
    }
}

/// Client for the shared settings document
///
/// All read-merge-write cycles are serialized through one lock, so two
/// requests updating different keys can never lose each other's change.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    writes: AtomicU64,
}

impl SettingsStore {
    /// Open the settings document inside `settings_dir`
    ///
    /// The directory and `settings.json` must already exist and the document
    /// must parse; the agent never creates it.
    pub fn open(settings_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = settings_dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "settings path {} does not exist",
                dir.display()
            )));
        }

        let path = dir.join(SETTINGS_FILE_NAME);
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "Unable to find {} at {}",
                SETTINGS_FILE_NAME,
                path.display()
            )));
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
            writes: AtomicU64::new(0),
        };
        store.get_config()?;
        Ok(store)
    }

    /// Path of the settings document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of document writes completed by this store
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Read the full settings document
    pub fn get_config(&self) -> Result<SettingsDocument> {
        let content = fs::read_to_string(&self.path)?;
        let document: SettingsDocument = serde_json::from_str(&content)?;
        Ok(document)
    }

    /// Replace the settings document wholesale
    pub fn save_config(&self, document: &SettingsDocument) -> Result<()> {
        let _guard = self.lock();
        self.write_document(document)
    }

    /// Read the current document, overlay `update`, and write it back once
    pub fn apply(&self, update: &SettingsUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let _guard = self.lock();
        let mut document = self.get_config()?;
        update.merge_into(&mut document);
        self.write_document(&document)?;

        debug!(
            keys = ?update.keys().collect::<Vec<_>>(),
            "Applied settings update"
        );
        Ok(())
    }

    /// Write a single key immediately
    pub fn update_value(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.apply(&SettingsUpdate::new().set(key, value))
    }

    pub fn set_frequency(&self, mhz: f64) -> Result<()> {
        self.apply(&SettingsUpdate::new().frequency(mhz))
    }

    /// Fails without touching the document if `gain` is not a gain step
    pub fn set_gain(&self, gain: f64) -> Result<()> {
        self.apply(&SettingsUpdate::new().gain(gain)?)
    }

    pub fn set_output_vfo(&self, index: i64) -> Result<()> {
        self.apply(&SettingsUpdate::new().output_vfo(index))
    }

    pub fn set_vfo_frequency(&self, index: i64, hz: f64) -> Result<()> {
        self.apply(&SettingsUpdate::new().vfo_frequency(index, hz))
    }

    pub fn set_vfo_bandwidth(&self, index: i64, hz: f64) -> Result<()> {
        self.apply(&SettingsUpdate::new().vfo_bandwidth(index, hz))
    }

    pub fn optimize_short_bursts(&self, enabled: bool) -> Result<()> {
        self.apply(&SettingsUpdate::new().optimize_short_bursts(enabled))
    }

    pub fn set_coordinates(&self, coordinates: &Coordinates) -> Result<()> {
        self.apply(&SettingsUpdate::new().coordinates(coordinates))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock carries no broken state
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Temp file + rename. Caller holds the write lock.
    fn write_document(&self, document: &SettingsDocument) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut serializer)?;

        let temp_path = temp_path_for(&self.path);
        if let Err(e) = write_and_sync(&temp_path, &buf, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            warn!("Failed to replace {}: {}", self.path.display(), e);
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        let count = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(path = %self.path.display(), writes = count, "Settings document written");
        Ok(())
    }
}

/// `settings.json` → `settings.json.tmp`, in the same directory so the
/// rename never crosses filesystems
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_and_sync(temp_path: &Path, contents: &[u8], original: &Path) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;

    // Keep the device's ownership expectations: same mode as the file replaced
    if let Ok(metadata) = fs::metadata(original) {
        fs::set_permissions(temp_path, metadata.permissions())?;
    }
    Ok(())
}
