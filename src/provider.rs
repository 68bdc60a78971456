//! ==============================================================================
//! provider.rs - load-once sensor readings provider
//! ==============================================================================
//!
//! purpose:
//!     reads the static dataset, validates and normalizes every record, and
//!     caches the result for the lifetime of the process.
//!
//! lifecycle:
//!     empty -> (first successful get) -> loaded, forever
//!
//!     - a second get() returns the same Arc even if the file changed
//!     - a failed load leaves the cell empty, so the next get() tries again
//!     - concurrent first callers wait on a single load
//!
//! relationships:
//!     - used by: main.rs (preload at startup), server.rs (every view)
//!     - uses: domain.rs (normalization), error.rs (DataError)
//!
//! ==============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::domain::SensorReading;
use crate::error::DataError;

/// the loaded, immutable collection
pub type Readings = Arc<[SensorReading]>;

/// where the raw dataset text comes from.
///
/// reads are blocking; the provider runs them on the blocking pool.
pub trait ReadingSource: Send + Sync {
    fn read(&self) -> Result<String, DataError>;

    /// human readable origin for log lines
    fn describe(&self) -> String;
}

/// dataset stored as a json file on disk
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReadingSource for FileSource {
    fn read(&self) -> Result<String, DataError> {
        std::fs::read_to_string(&self.path).map_err(|source| DataError::Source {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// cloneable handle to the shared cache
#[derive(Clone)]
pub struct SensorReadingsProvider {
    source: Arc<dyn ReadingSource>,
    readings: Arc<OnceCell<Readings>>,
}

impl SensorReadingsProvider {
    pub fn new(source: impl ReadingSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            readings: Arc::new(OnceCell::new()),
        }
    }

    /// return the full normalized collection, loading it on first use
    pub async fn get(&self) -> Result<Readings, DataError> {
        self.readings
            .get_or_try_init(|| self.load())
            .await
            .cloned()
    }

    /// true once a load has succeeded
    pub fn is_loaded(&self) -> bool {
        self.readings.initialized()
    }

    async fn load(&self) -> Result<Readings, DataError> {
        let source = self.source.clone();
        let origin = source.describe();
        tracing::debug!(%origin, "loading sensor readings");

        // offload blocking io to dedicated thread
        let text = match tokio::task::spawn_blocking(move || source.read()).await {
            Ok(res) => res?,
            Err(e) => {
                return Err(DataError::Source {
                    path: PathBuf::from(&origin),
                    source: std::io::Error::other(e),
                })
            }
        };

        let readings = parse_dataset(&text)?;
        tracing::info!(%origin, count = readings.len(), "sensor readings loaded");
        Ok(readings)
    }
}

/// parse and normalize a whole dataset document.
///
/// the first invalid record aborts everything; there is no partial result.
pub fn parse_dataset(text: &str) -> Result<Readings, DataError> {
    let doc: Value = serde_json::from_str(text)?;
    let entries = doc
        .get("sensor_readings")
        .and_then(Value::as_array)
        .ok_or(DataError::MissingCollection)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            SensorReading::from_raw(raw).map_err(|field| DataError::InvalidRecord { index, field })
        })
        .collect()
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::FieldProblem;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// in-memory source that counts how often it was read
    #[derive(Clone)]
    pub(crate) struct MemorySource {
        text: Arc<Mutex<String>>,
        reads: Arc<AtomicUsize>,
    }

    impl MemorySource {
        pub(crate) fn new(text: impl Into<String>) -> Self {
            Self {
                text: Arc::new(Mutex::new(text.into())),
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub(crate) fn replace(&self, text: impl Into<String>) {
            *self.text.lock().unwrap() = text.into();
        }

        pub(crate) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl ReadingSource for MemorySource {
        fn read(&self) -> Result<String, DataError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.lock().unwrap().clone())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    pub(crate) fn record(id: &str, sensor_type: &str, name: &str, ts: &str) -> Value {
        serde_json::json!({
            "id": id,
            "box_id": "box-1",
            "sensor_type": sensor_type,
            "name": name,
            "range_l": 0,
            "range_u": 100,
            "longitude": 13.4,
            "latitude": 52.5,
            "reading": 0,
            "unit": "ppm",
            "reading_ts": ts
        })
    }

    pub(crate) fn dataset(records: Vec<Value>) -> String {
        serde_json::json!({ "sensor_readings": records }).to_string()
    }

    #[test]
    fn test_missing_collection() {
        assert_matches!(
            parse_dataset(r#"{"readings": []}"#),
            Err(DataError::MissingCollection)
        );
        assert_matches!(
            parse_dataset(r#"{"sensor_readings": {}}"#),
            Err(DataError::MissingCollection)
        );
    }

    #[test]
    fn test_not_json() {
        assert_matches!(parse_dataset("not json"), Err(DataError::Malformed(_)));
    }

    #[test]
    fn test_one_bad_record_aborts_the_load() {
        let mut bad = record("b", "CO2", "co2", "2020-01-01T00:00:00Z");
        bad.as_object_mut().unwrap().remove("unit");
        let text = dataset(vec![
            record("a", "CO2", "co2", "2020-01-01T00:00:00Z"),
            bad,
            record("c", "CO2", "co2", "2020-01-01T00:00:00Z"),
        ]);
        assert_matches!(
            parse_dataset(&text),
            Err(DataError::InvalidRecord { index: 1, field: FieldProblem::Missing("unit") })
        );
    }

    #[test]
    fn test_bundled_dataset_loads() {
        let readings = parse_dataset(include_str!("../data/sensor_readings.json")).unwrap();
        assert_eq!(readings.len(), 60);
        assert!(readings.iter().all(|r| r.longitude.is_some()));
    }

    #[test]
    fn test_empty_collection_is_valid() {
        assert_eq!(parse_dataset(r#"{"sensor_readings": []}"#).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_get_is_cached() {
        let source = MemorySource::new(dataset(vec![
            record("a", "CO2", "co2", "2020-01-01T00:00:00Z"),
        ]));
        let provider = SensorReadingsProvider::new(source.clone());
        assert!(!provider.is_loaded());

        let first = provider.get().await.unwrap();
        let second = provider.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads(), 1);
        assert!(provider.is_loaded());
    }

    #[tokio::test]
    async fn test_cache_ignores_source_changes() {
        let source = MemorySource::new(dataset(vec![
            record("a", "CO2", "co2", "2020-01-01T00:00:00Z"),
        ]));
        let provider = SensorReadingsProvider::new(source.clone());
        assert_eq!(provider.get().await.unwrap().len(), 1);

        source.replace(dataset(vec![
            record("a", "CO2", "co2", "2020-01-01T00:00:00Z"),
            record("b", "CO2", "co2", "2020-01-01T00:00:00Z"),
        ]));

        // clones share the same cell
        let clone = provider.clone();
        assert_eq!(clone.get().await.unwrap().len(), 1);
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_empty_collection_is_cached() {
        let source = MemorySource::new(dataset(vec![]));
        let provider = SensorReadingsProvider::new(source.clone());

        assert_eq!(provider.get().await.unwrap().len(), 0);
        assert!(provider.is_loaded());

        source.replace(dataset(vec![record("a", "CO2", "co2", "2020-01-01T00:00:00Z")]));
        assert_eq!(provider.get().await.unwrap().len(), 0);
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let source = MemorySource::new(r#"{"nope": []}"#);
        let provider = SensorReadingsProvider::new(source.clone());

        assert_matches!(provider.get().await, Err(DataError::MissingCollection));
        assert_matches!(provider.get().await, Err(DataError::MissingCollection));
        assert_eq!(source.reads(), 2);
        assert!(!provider.is_loaded());

        // once the source is fixed the next get succeeds
        source.replace(dataset(vec![record("a", "CO2", "co2", "2020-01-01T00:00:00Z")]));
        assert_eq!(provider.get().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_get_reads_once() {
        let source = MemorySource::new(dataset(vec![
            record("a", "CO2", "co2", "2020-01-01T00:00:00Z"),
        ]));
        let provider = SensorReadingsProvider::new(source.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = provider.clone();
                tokio::spawn(async move { p.get().await.map(|r| r.len()) })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 1);
        }
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let provider = SensorReadingsProvider::new(FileSource::new("does/not/exist.json"));
        assert_matches!(provider.get().await, Err(DataError::Source { .. }));
    }
}
