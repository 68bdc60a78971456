//! ==============================================================================
//! table.rs - filter -> sort -> paginate pipeline
//! ==============================================================================
//!
//! purpose:
//!     the three steps every table view runs, as plain functions over slices:
//!
//!         all readings ──► apply_filter ──► apply_sort ──► apply_page ──► rows
//!
//!     the order is fixed. totals and page boundaries always describe the
//!     filtered set, never the raw collection.
//!
//! relationships:
//!     - used by: view.rs (stateful view), server.rs (stateless json query)
//!
//! ==============================================================================

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::SensorReading;
use crate::error::ViewError;

/// page sizes the pager offers
pub const PAGE_SIZE_OPTIONS: [usize; 5] = [10, 25, 50, 100, 250];

/// the two columns that can be sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    SensorType,
    ReadingTime,
}

impl FromStr for SortColumn {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensorType" => Ok(SortColumn::SensorType),
            "readingTime" => Ok(SortColumn::ReadingTime),
            other => Err(ViewError::UnknownColumn(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// active sort, `None` on the view means "input order"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: SortColumn) -> Self {
        Self { column, direction: SortDirection::Asc }
    }

    pub fn desc(column: SortColumn) -> Self {
        Self { column, direction: SortDirection::Desc }
    }
}

/// advance the header click cycle for `column`.
///
/// none -> asc -> desc -> none on the same column; a different column
/// always starts at asc.
pub fn next_sort(current: Option<Sort>, column: SortColumn) -> Option<Sort> {
    match current {
        Some(s) if s.column == column => match s.direction {
            SortDirection::Asc => Some(Sort::desc(column)),
            SortDirection::Desc => None,
        },
        _ => Some(Sort::asc(column)),
    }
}

/// case-insensitive substring match against sensor type or name.
///
/// `needle` must already be lowercased.
pub fn matches_filter(reading: &SensorReading, needle: &str) -> bool {
    needle.is_empty()
        || reading.sensor_type.to_lowercase().contains(needle)
        || reading.name.to_lowercase().contains(needle)
}

/// normalize raw filter text the way it is matched.
///
/// only case is folded; whitespace is part of the needle.
pub fn normalize_filter(filter: &str) -> String {
    filter.to_lowercase()
}

/// keep the readings that match `filter`, in input order
pub fn apply_filter<'a>(readings: &'a [SensorReading], filter: &str) -> Vec<&'a SensorReading> {
    let needle = normalize_filter(filter);
    readings
        .iter()
        .filter(|r| matches_filter(r, &needle))
        .collect()
}

/// stable sort; `None` leaves the input order untouched
pub fn apply_sort(rows: &mut [&SensorReading], sort: Option<Sort>) {
    let Some(sort) = sort else { return };

    let cmp: fn(&SensorReading, &SensorReading) -> Ordering = match sort.column {
        SortColumn::SensorType => {
            |a: &SensorReading, b: &SensorReading| a.sensor_type.cmp(&b.sensor_type)
        }
        SortColumn::ReadingTime => {
            |a: &SensorReading, b: &SensorReading| a.reading_time.cmp(&b.reading_time)
        }
    };

    match sort.direction {
        SortDirection::Asc => rows.sort_by(|a, b| cmp(a, b)),
        SortDirection::Desc => rows.sort_by(|a, b| cmp(b, a)),
    }
}

/// which slice of the sorted rows to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(index: usize, size: usize) -> Result<Self, ViewError> {
        if !PAGE_SIZE_OPTIONS.contains(&size) {
            return Err(ViewError::UnsupportedPageSize(size));
        }
        Ok(Self { index, size })
    }

    pub fn first(size: usize) -> Result<Self, ViewError> {
        Self::new(0, size)
    }
}

/// one page of rows plus the numbers a pager needs
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// total rows after filtering
    pub total: usize,
    /// page actually shown, after clamping
    pub index: usize,
    pub size: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        page_count(self.total, self.size)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            total: self.total,
            index: self.index,
            size: self.size,
        }
    }
}

pub fn page_count(total: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size)
}

/// slice out one page. an index past the end clamps to the last page.
pub fn apply_page<T: Clone>(rows: &[T], request: PageRequest) -> Page<T> {
    let total = rows.len();
    let last = page_count(total, request.size).saturating_sub(1);
    let index = request.index.min(last);
    let start = (index * request.size).min(total);
    let end = (start + request.size).min(total);

    Page {
        rows: rows[start..end].to_vec(),
        total,
        index,
        size: request.size,
    }
}

/// the whole pipeline in its fixed order
pub fn query<'a>(
    readings: &'a [SensorReading],
    filter: &str,
    sort: Option<Sort>,
    page: PageRequest,
) -> Page<&'a SensorReading> {
    let mut rows = apply_filter(readings, filter);
    apply_sort(&mut rows, sort);
    apply_page(&rows, page)
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    pub(crate) fn reading(id: &str, sensor_type: &str, name: &str, minute: u32) -> SensorReading {
        SensorReading {
            id: id.to_string(),
            box_id: "box-1".to_string(),
            sensor_type: sensor_type.to_string(),
            name: name.to_string(),
            range_lower: Some(0.0),
            range_upper: Some(100.0),
            longitude: None,
            latitude: None,
            reading: Some(1.0),
            reading_unit: "u".to_string(),
            reading_time: Utc.with_ymd_and_hms(2020, 1, 1, 12, minute, 0).unwrap(),
        }
    }

    fn ids(rows: &[&SensorReading]) -> Vec<String> {
        rows.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_filter_matches_type_or_name_case_insensitively() {
        let data = vec![
            reading("a", "Temperature", "board", 0),
            reading("b", "Humidity", "ambient temp", 1),
            reading("c", "Humidity", "relative", 2),
        ];
        assert_eq!(ids(&apply_filter(&data, "TEMP")), vec!["a", "b"]);
        assert_eq!(ids(&apply_filter(&data, "")), vec!["a", "b", "c"]);
        assert_eq!(ids(&apply_filter(&data, "HUMID")), vec!["b", "c"]);
        assert!(apply_filter(&data, "pressure").is_empty());
    }

    #[test]
    fn test_filter_whitespace_is_matched_literally() {
        let data = vec![
            reading("a", "Temperature", "board", 0),
            reading("b", "Humidity", "ambient temp", 1),
        ];
        assert_eq!(ids(&apply_filter(&data, " temp")), vec!["b"]);
        assert_eq!(ids(&apply_filter(&data, "   ")), Vec::<String>::new());
        assert_eq!(ids(&apply_filter(&data, " ")), vec!["b"]);
    }

    #[test]
    fn test_sort_by_sensor_type() {
        let data = vec![
            reading("a", "Temperature", "x", 0),
            reading("b", "CO2", "x", 1),
            reading("c", "Humidity", "x", 2),
        ];
        let mut rows = apply_filter(&data, "");
        apply_sort(&mut rows, Some(Sort::asc(SortColumn::SensorType)));
        assert_eq!(ids(&rows), vec!["b", "c", "a"]);
        apply_sort(&mut rows, Some(Sort::desc(SortColumn::SensorType)));
        assert_eq!(ids(&rows), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let data = vec![
            reading("a", "CO2", "x", 5),
            reading("b", "Humidity", "x", 4),
            reading("c", "CO2", "x", 3),
        ];
        let mut rows = apply_filter(&data, "");
        apply_sort(&mut rows, Some(Sort::asc(SortColumn::SensorType)));
        assert_eq!(ids(&rows), vec!["a", "c", "b"]);
        let mut rows = apply_filter(&data, "");
        apply_sort(&mut rows, Some(Sort::desc(SortColumn::SensorType)));
        assert_eq!(ids(&rows), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_reading_time_cycle() {
        let data = vec![
            reading("late", "x", "x", 30),
            reading("early", "x", "x", 10),
            reading("mid", "x", "x", 20),
        ];

        let sort = next_sort(None, SortColumn::ReadingTime);
        assert_eq!(sort, Some(Sort::asc(SortColumn::ReadingTime)));
        let page = query(&data, "", sort, PageRequest::first(10).unwrap());
        assert_eq!(ids(&page.rows), vec!["early", "mid", "late"]);

        let sort = next_sort(sort, SortColumn::ReadingTime);
        assert_eq!(sort, Some(Sort::desc(SortColumn::ReadingTime)));
        let page = query(&data, "", sort, PageRequest::first(10).unwrap());
        assert_eq!(ids(&page.rows), vec!["late", "mid", "early"]);

        // third click drops back to input order
        let sort = next_sort(sort, SortColumn::ReadingTime);
        assert_eq!(sort, None);
        let page = query(&data, "", sort, PageRequest::first(10).unwrap());
        assert_eq!(ids(&page.rows), vec!["late", "early", "mid"]);
    }

    #[test]
    fn test_switching_column_starts_ascending() {
        let sort = Some(Sort::desc(SortColumn::ReadingTime));
        assert_eq!(
            next_sort(sort, SortColumn::SensorType),
            Some(Sort::asc(SortColumn::SensorType))
        );
    }

    #[test]
    fn test_page_slicing() {
        let data: Vec<_> = (0..23).map(|i| reading(&i.to_string(), "x", "x", 0)).collect();
        let rows: Vec<_> = data.iter().collect();

        let p = apply_page(&rows, PageRequest::new(0, 10).unwrap());
        assert_eq!(p.rows.len(), 10);
        assert_eq!(p.total, 23);
        assert_eq!(p.page_count(), 3);

        let p = apply_page(&rows, PageRequest::new(2, 10).unwrap());
        assert_eq!(ids(&p.rows), vec!["20", "21", "22"]);

        // past the end clamps to the last page
        let p = apply_page(&rows, PageRequest::new(9, 10).unwrap());
        assert_eq!(p.index, 2);
        assert_eq!(p.rows.len(), 3);
    }

    #[test]
    fn test_empty_page() {
        let rows: Vec<&SensorReading> = Vec::new();
        let p = apply_page(&rows, PageRequest::new(3, 25).unwrap());
        assert_eq!(p.index, 0);
        assert_eq!(p.total, 0);
        assert_eq!(p.page_count(), 0);
        assert!(p.rows.is_empty());
    }

    #[test]
    fn test_unsupported_page_size() {
        assert_eq!(PageRequest::new(0, 7), Err(ViewError::UnsupportedPageSize(7)));
        for size in PAGE_SIZE_OPTIONS {
            assert!(PageRequest::new(0, size).is_ok());
        }
    }

    #[test]
    fn test_co2_end_to_end() {
        let data = vec![
            reading("1", "CO2", "indoor", 0),
            reading("2", "Temperature", "indoor", 1),
            reading("3", "CO2", "outdoor", 2),
        ];
        let page = query(&data, "co2", None, PageRequest::first(10).unwrap());
        assert_eq!(ids(&page.rows), vec!["1", "3"]);
        assert_eq!(page.total, 2);
        assert_eq!(page.index, 0);
    }

    #[test]
    fn test_counts_follow_the_filtered_set() {
        let mut data: Vec<_> = (0..30).map(|i| reading(&format!("t{i}"), "Temp", "x", 0)).collect();
        data.extend((0..5).map(|i| reading(&format!("c{i}"), "CO2", "x", 0)));
        let page = query(&data, "co2", None, PageRequest::new(1, 10).unwrap());
        assert_eq!(page.total, 5);
        assert_eq!(page.index, 0);
        assert_eq!(page.rows.len(), 5);
    }

    #[test]
    fn test_sort_column_from_str() {
        assert_eq!("sensorType".parse::<SortColumn>(), Ok(SortColumn::SensorType));
        assert_eq!("readingTime".parse::<SortColumn>(), Ok(SortColumn::ReadingTime));
        assert_eq!(
            "name".parse::<SortColumn>(),
            Err(ViewError::UnknownColumn("name".to_string()))
        );
    }
}
