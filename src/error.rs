//! ==============================================================================
//! error.rs - error taxonomy for the data provider and the table view
//! ==============================================================================
//!
//! purpose:
//!     typed errors for the two seams where things can go wrong:
//!     - loading the dataset (DataError)
//!     - building or driving a table view (ViewError)
//!
//! relationships:
//!     - used by: domain.rs, provider.rs (DataError)
//!     - used by: view.rs, server.rs (ViewError)
//!     - main.rs wraps both into anyhow at the binary edge
//!
//! ==============================================================================

use std::path::PathBuf;

/// failures while loading the sensor readings dataset.
///
/// every variant is fatal for the load: no partial dataset is ever exposed.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read dataset {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sensor readings not found in data (missing `sensor_readings` collection)")]
    MissingCollection,

    #[error("sensor reading #{index} is not valid: {field}")]
    InvalidRecord { index: usize, field: FieldProblem },
}

/// what exactly was wrong with a single raw record
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldProblem {
    #[error("record is not a json object")]
    NotAnObject,
    #[error("required field `{0}` is missing")]
    Missing(&'static str),
    #[error("required field `{0}` is empty")]
    Empty(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
    #[error("field `reading_ts` is not a recognised timestamp: {0:?}")]
    BadTimestamp(String),
}

/// failures while building or driving a table view
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    #[error("table {0} binding not found")]
    MissingViewBinding(&'static str),

    #[error("page size {0} is not one of the offered options")]
    UnsupportedPageSize(usize),

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("column `{0}` is not sortable")]
    NotSortable(&'static str),
}
