//! ==============================================================================
//! view.rs - stateful table view
//! ==============================================================================
//!
//! purpose:
//!     holds what one user is looking at (filter text, sort, page) over the
//!     shared immutable collection, and renders it into the 11 fixed columns.
//!
//! state transitions:
//!     - set_filter:    new filter text -> page index back to 0
//!     - click_header:  none -> asc -> desc -> none (sortable columns only)
//!     - set_page_size: keeps the first visible row on screen
//!     - set_page:      clamped to the last page of the filtered set
//!
//! relationships:
//!     - uses: table.rs (pipeline), provider.rs (Readings)
//!     - used by: server.rs (dashboard render, live sessions)
//!
//! ==============================================================================

use std::str::FromStr;

use serde::Serialize;

use crate::domain::SensorReading;
use crate::error::ViewError;
use crate::provider::Readings;
use crate::table::{self, PageRequest, Sort, SortColumn, SortDirection, PAGE_SIZE_OPTIONS};

/// display format of the Time column
pub const TIME_FORMAT: &str = "%d/%m/%y %H:%M";

/// the rendered columns, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    BoxId,
    SensorType,
    Name,
    RangeLower,
    RangeUpper,
    Longitude,
    Latitude,
    Reading,
    ReadingUnit,
    ReadingTime,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::Id,
        Column::BoxId,
        Column::SensorType,
        Column::Name,
        Column::RangeLower,
        Column::RangeUpper,
        Column::Longitude,
        Column::Latitude,
        Column::Reading,
        Column::ReadingUnit,
        Column::ReadingTime,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::BoxId => "boxId",
            Column::SensorType => "sensorType",
            Column::Name => "name",
            Column::RangeLower => "rangeLower",
            Column::RangeUpper => "rangeUpper",
            Column::Longitude => "longitude",
            Column::Latitude => "latitude",
            Column::Reading => "reading",
            Column::ReadingUnit => "readingUnit",
            Column::ReadingTime => "readingTime",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::BoxId => "Box ID",
            Column::SensorType => "Sensor Type",
            Column::Name => "Name",
            Column::RangeLower => "Range Lower",
            Column::RangeUpper => "Range Upper",
            Column::Longitude => "Longitude",
            Column::Latitude => "Latitude",
            Column::Reading => "Reading",
            Column::ReadingUnit => "Unit",
            Column::ReadingTime => "Time",
        }
    }

    pub fn sort_column(self) -> Option<SortColumn> {
        match self {
            Column::SensorType => Some(SortColumn::SensorType),
            Column::ReadingTime => Some(SortColumn::ReadingTime),
            _ => None,
        }
    }

    /// cell text for one reading
    pub fn cell(self, r: &SensorReading) -> String {
        match self {
            Column::Id => r.id.clone(),
            Column::BoxId => r.box_id.clone(),
            Column::SensorType => r.sensor_type.clone(),
            Column::Name => r.name.clone(),
            Column::RangeLower => number_cell(r.range_lower),
            Column::RangeUpper => number_cell(r.range_upper),
            Column::Longitude => number_cell(r.longitude),
            Column::Latitude => number_cell(r.latitude),
            Column::Reading => number_cell(r.reading),
            Column::ReadingUnit => r.reading_unit.clone(),
            Column::ReadingTime => r.reading_time.format(TIME_FORMAT).to_string(),
        }
    }
}

/// absent numbers render as an empty cell
fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl FromStr for Column {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| ViewError::UnknownColumn(s.to_string()))
    }
}

// ==============================================================================
// bindings
// ==============================================================================

/// sort control attached to the header row
#[derive(Debug, Clone, Copy, Default)]
pub struct SortBinding {
    pub initial: Option<Sort>,
}

/// pager control under the table
#[derive(Debug, Clone, Copy)]
pub struct PagerBinding {
    pub page_size: usize,
}

impl PagerBinding {
    pub fn new(page_size: usize) -> Result<Self, ViewError> {
        PageRequest::first(page_size)?;
        Ok(Self { page_size })
    }
}

impl Default for PagerBinding {
    fn default() -> Self {
        Self { page_size: PAGE_SIZE_OPTIONS[0] }
    }
}

pub struct TableViewBuilder {
    readings: Readings,
    sort: Option<SortBinding>,
    pager: Option<PagerBinding>,
}

impl TableViewBuilder {
    pub fn sort(mut self, binding: SortBinding) -> Self {
        self.sort = Some(binding);
        self
    }

    pub fn pager(mut self, binding: PagerBinding) -> Self {
        self.pager = Some(binding);
        self
    }

    /// both controls must be attached before the view can run
    pub fn build(self) -> Result<TableView, ViewError> {
        let sort = self.sort.ok_or(ViewError::MissingViewBinding("sort"))?;
        let pager = self.pager.ok_or(ViewError::MissingViewBinding("paginator"))?;

        Ok(TableView {
            readings: self.readings,
            filter: String::new(),
            sort: sort.initial,
            page_index: 0,
            page_size: pager.page_size,
        })
    }
}

// ==============================================================================
// view
// ==============================================================================

pub struct TableView {
    readings: Readings,
    filter: String,
    sort: Option<Sort>,
    page_index: usize,
    page_size: usize,
}

impl TableView {
    pub fn builder(readings: Readings) -> TableViewBuilder {
        TableViewBuilder { readings, sort: None, pager: None }
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// apply a new filter. returns false when the effective filter did not change.
    pub fn set_filter(&mut self, raw: &str) -> bool {
        let filter = table::normalize_filter(raw);
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        self.page_index = 0;
        true
    }

    /// header click on `column`; non-sortable columns leave the view untouched
    pub fn click_header(&mut self, column: Column) -> Result<Option<Sort>, ViewError> {
        let sortable = column.sort_column().ok_or(ViewError::NotSortable(column.key()))?;
        self.sort = table::next_sort(self.sort, sortable);
        Ok(self.sort)
    }

    pub fn set_page(&mut self, index: usize) {
        let last = table::page_count(self.filtered_len(), self.page_size).saturating_sub(1);
        self.page_index = index.min(last);
    }

    /// change the page size, keeping the first visible row on the new page
    pub fn set_page_size(&mut self, size: usize) -> Result<(), ViewError> {
        PageRequest::first(size)?;
        let first_row = self.page_index * self.page_size;
        self.page_size = size;
        self.page_index = first_row / size;
        Ok(())
    }

    fn filtered_len(&self) -> usize {
        self.readings
            .iter()
            .filter(|r| table::matches_filter(r, &self.filter))
            .count()
    }

    /// run the pipeline and render the visible page
    pub fn render(&self) -> TableSnapshot {
        let request = PageRequest { index: self.page_index, size: self.page_size };
        let page = table::query(&self.readings, &self.filter, self.sort, request);

        let columns = Column::ALL
            .into_iter()
            .map(|c| ColumnHeader {
                key: c.key(),
                header: c.header(),
                sortable: c.sort_column().is_some(),
                direction: self
                    .sort
                    .filter(|s| Some(s.column) == c.sort_column())
                    .map(|s| s.direction),
            })
            .collect();

        let rows = page
            .rows
            .iter()
            .map(|r| Column::ALL.into_iter().map(|c| c.cell(r)).collect())
            .collect();

        TableSnapshot {
            filter: self.filter.clone(),
            columns,
            page_count: page.page_count(),
            rows,
            total: page.total,
            page_index: page.index,
            page_size: page.size,
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub key: &'static str,
    pub header: &'static str,
    pub sortable: bool,
    pub direction: Option<SortDirection>,
}

/// everything a client needs to draw the table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub filter: String,
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<String>>,
    pub total: usize,
    pub page_index: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub page_size_options: Vec<usize>,
}
