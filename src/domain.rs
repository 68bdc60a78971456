//! ==============================================================================
//! domain.rs - the sensor reading record and its normalization
//! ==============================================================================
//!
//! purpose:
//!     the dataset stores snake_case records (box_id, range_l, reading_ts, ...).
//!     everything past the provider works with the normalized camelCase
//!     SensorReading. this module owns that translation and the required-field
//!     checks that gate it.
//!
//! relationships:
//!     - used by: provider.rs (normalize every raw entry during load)
//!     - used by: table.rs, view.rs (field access for filter/sort/render)
//!
//! ==============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FieldProblem;

/// one measurement event with instrument metadata, location, value and time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// opaque identifier for this reading
    pub id: String,
    /// opaque identifier of the box that produced it
    pub box_id: String,
    /// type of the sensor (e.g. "Temperature", "CO2")
    pub sensor_type: String,
    /// what the sensor measures
    pub name: String,
    /// measuring range lower bound, `None` when the source key holds null
    pub range_lower: Option<f64>,
    /// measuring range upper bound
    pub range_upper: Option<f64>,
    /// location of the box, display only
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// actual value being read
    pub reading: Option<f64>,
    /// measurement unit
    pub reading_unit: String,
    /// when the reading was taken
    pub reading_time: DateTime<Utc>,
}

impl SensorReading {
    /// validate one raw dataset entry and map it to the normalized shape.
    ///
    /// strings must be present and non-empty. numbers must be present but
    /// zero is a perfectly good value, and so is an explicit null.
    /// longitude/latitude are not checked.
    pub fn from_raw(raw: &Value) -> Result<Self, FieldProblem> {
        let obj = raw.as_object().ok_or(FieldProblem::NotAnObject)?;

        let id = required_str(obj, "id")?;
        let box_id = required_str(obj, "box_id")?;
        let sensor_type = required_str(obj, "sensor_type")?;
        let name = required_str(obj, "name")?;
        let range_lower = required_num(obj, "range_l")?;
        let range_upper = required_num(obj, "range_u")?;
        let reading = required_num(obj, "reading")?;
        let reading_unit = required_str(obj, "unit")?;
        let reading_ts = required_str(obj, "reading_ts")?;
        let reading_time = parse_timestamp(&reading_ts)
            .ok_or_else(|| FieldProblem::BadTimestamp(reading_ts.clone()))?;

        Ok(Self {
            id,
            box_id,
            sensor_type,
            name,
            range_lower,
            range_upper,
            longitude: optional_num(obj, "longitude"),
            latitude: optional_num(obj, "latitude"),
            reading,
            reading_unit,
            reading_time,
        })
    }
}

fn required_str(obj: &Map<String, Value>, key: &'static str) -> Result<String, FieldProblem> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(FieldProblem::Missing(key)),
        Some(Value::String(s)) if s.is_empty() => Err(FieldProblem::Empty(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FieldProblem::WrongType(key)),
    }
}

/// the key has to exist; a present null is kept as `None`
fn required_num(obj: &Map<String, Value>, key: &'static str) -> Result<Option<f64>, FieldProblem> {
    match obj.get(key) {
        None => Err(FieldProblem::Missing(key)),
        Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or(FieldProblem::WrongType(key)),
    }
}

fn optional_num(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

/// parse a `reading_ts` value.
///
/// accepts, in order: rfc 3339 with offset, iso-8601 without offset (utc),
/// a bare date (utc midnight), or an integer string of epoch milliseconds.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(ts, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }

    ts.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}
