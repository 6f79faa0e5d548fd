use thiserror::Error;

/// Failure conditions surfaced to the dashboard's caller.
///
/// Malformed cell values are not represented here: they are recovered to zero
/// during ingestion and only counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// The dataset source was unreachable or unreadable at the transport level.
    #[error("error loading data: {0}")]
    DatasetLoadFailure(String),
    /// Ingestion succeeded but produced no usable rows.
    #[error("no data found")]
    EmptyDataset,
    /// The requested year range contains none of the years present in the data.
    #[error("no years selected: {start}–{end} contains no data years")]
    EmptyFilterSelection { start: i32, end: i32 },
}
